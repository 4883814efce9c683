use std::env::var;
use std::path::PathBuf;
use std::time::Duration;

use dotenvy::dotenv;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Application configuration with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    /// Player directory API token
    /// Env: BM_API_TOKEN (required)
    pub directory_token: String,

    /// Discord bot token
    /// Env: DISCORD_BOT_TOKEN (required)
    pub discord_token: String,

    /// Channel that holds the two summary messages
    /// Env: CHANNEL_ID (required)
    pub channel_id: u64,

    /// Game server whose players are tracked
    /// Env: SERVER_ID (required)
    pub server_id: String,

    /// Pre-seeded id of the online summary message
    /// Env: ONLINE_MESSAGE_ID (optional)
    pub online_message_id: Option<u64>,

    /// Pre-seeded id of the recent log-offs message
    /// Env: OFFLINE_MESSAGE_ID (optional)
    pub offline_message_id: Option<u64>,

    /// Directory holding the session log and message reference files
    /// Env: DATA_DIR (default: ".")
    pub data_dir: PathBuf,

    /// Player directory base URL
    /// Env: BM_API_URL (default: "https://api.battlemetrics.com")
    pub directory_url: String,

    /// Maximum outbound requests in flight
    /// Env: MAX_CONCURRENT_REQUESTS (default: 45)
    pub max_concurrent_requests: usize,

    /// Retries after a throttled or failed request before giving up
    /// Env: MAX_RETRIES (default: 10)
    pub max_retries: u32,

    /// Base of the exponential backoff
    /// Env: BACKOFF_BASE_SECS (default: 1)
    pub backoff_base: Duration,

    /// Upper bound of the exponential backoff
    /// Env: MAX_BACKOFF_SECS (default: 60)
    pub max_backoff: Duration,

    /// How long a fetched player detail is reused
    /// Env: CACHE_TTL_SECS (default: 600)
    pub cache_ttl: Duration,

    /// Fast cycle: list, merge, and refresh both messages
    /// Env: PLAYER_LIST_INTERVAL_SECS (default: 60)
    pub player_list_interval: Duration,

    /// Slow cycle: list and merge only
    /// Env: PLAYER_DETAILS_INTERVAL_SECS (default: 300)
    pub player_details_interval: Duration,

    /// Per-request timeout
    /// Env: REQUEST_TIMEOUT_SECS (default: 30)
    pub request_timeout: Duration,

    /// Players per directory page
    /// Env: PAGE_SIZE (default: 100)
    pub page_size: usize,

    /// Pagination cap; players past `page_size * max_pages` are not listed
    /// Env: MAX_PAGES (default: 10)
    pub max_pages: usize,

    /// Rows in the online summary
    /// Env: ONLINE_LIST_LIMIT (default: 120)
    pub online_list_limit: usize,

    /// Rows in the recent log-offs summary
    /// Env: OFFLINE_LIST_LIMIT (default: 5)
    pub offline_list_limit: usize,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv(); //for local runs mostly
        let defaults = Self::default();
        Ok(Self {
            directory_token: required("BM_API_TOKEN")?,
            discord_token: required("DISCORD_BOT_TOKEN")?,
            channel_id: required_id("CHANNEL_ID")?,
            server_id: required("SERVER_ID")?,
            online_message_id: optional_parsed::<u64>("ONLINE_MESSAGE_ID")?.filter(|id| *id != 0),
            offline_message_id: optional_parsed::<u64>("OFFLINE_MESSAGE_ID")?.filter(|id| *id != 0),
            data_dir: var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            directory_url: env_or_default_string("BM_API_URL", &defaults.directory_url),
            max_concurrent_requests: env_or_default(
                "MAX_CONCURRENT_REQUESTS",
                defaults.max_concurrent_requests,
            ),
            max_retries: env_or_default("MAX_RETRIES", defaults.max_retries),
            backoff_base: Duration::from_secs(env_or_default("BACKOFF_BASE_SECS", 1)),
            max_backoff: Duration::from_secs(env_or_default("MAX_BACKOFF_SECS", 60)),
            cache_ttl: Duration::from_secs(env_or_default("CACHE_TTL_SECS", 600)),
            player_list_interval: Duration::from_secs(env_or_default(
                "PLAYER_LIST_INTERVAL_SECS",
                60,
            )),
            player_details_interval: Duration::from_secs(env_or_default(
                "PLAYER_DETAILS_INTERVAL_SECS",
                300,
            )),
            request_timeout: Duration::from_secs(env_or_default("REQUEST_TIMEOUT_SECS", 30)),
            page_size: env_or_default("PAGE_SIZE", defaults.page_size),
            max_pages: env_or_default("MAX_PAGES", defaults.max_pages),
            online_list_limit: env_or_default("ONLINE_LIST_LIMIT", defaults.online_list_limit),
            offline_list_limit: env_or_default("OFFLINE_LIST_LIMIT", defaults.offline_list_limit),
        })
    }
}

impl Default for Config {
    /// All defaults, with empty credentials and ids
    fn default() -> Self {
        Self {
            directory_token: String::new(),
            discord_token: String::new(),
            channel_id: 0,
            server_id: String::new(),
            online_message_id: None,
            offline_message_id: None,
            data_dir: PathBuf::from("."),
            directory_url: "https://api.battlemetrics.com".to_string(),
            max_concurrent_requests: 45,
            max_retries: 10,
            backoff_base: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            cache_ttl: Duration::from_secs(600),
            player_list_interval: Duration::from_secs(60),
            player_details_interval: Duration::from_secs(300),
            request_timeout: Duration::from_secs(30),
            page_size: 100,
            max_pages: 10,
            online_list_limit: 120,
            offline_list_limit: 5,
        }
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    match var(key) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn required_parsed<T: std::str::FromStr>(key: &'static str) -> Result<T, ConfigError> {
    let val = required(key)?;
    val.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value: val })
}

/// Discord snowflake; zero is not a valid id.
fn required_id(key: &'static str) -> Result<u64, ConfigError> {
    match required_parsed::<u64>(key)? {
        0 => Err(ConfigError::Invalid {
            key,
            value: "0".to_string(),
        }),
        id => Ok(id),
    }
}

/// Absent or empty is `None`; present but unparsable is an error.
fn optional_parsed<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match var(key) {
        Ok(val) if !val.trim().is_empty() => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: val }),
        _ => Ok(None),
    }
}

/// Parse environment variable or return default value
fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}

/// Parse environment variable string or return default value
fn env_or_default_string(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| default.to_string())
}
