pub mod cache;
pub mod config;
pub mod directory;
mod error;
pub mod fetcher;
pub mod helpers;
pub mod scheduler;
pub mod sink;
pub mod summary;

pub use error::{FetchError, SinkError};

use std::sync::Arc;

use playwatch_db::{Store, SummaryKind};

use crate::config::{Config, ConfigError};
use crate::directory::DirectoryClient;
use crate::fetcher::{FetcherConfig, RateLimitedFetcher};
use crate::scheduler::Poller;
use crate::sink::{MessageApi, MessageSink};

/// Startup failures that keep the process from running.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build http client: {0}")]
    Http(#[from] FetchError),
    #[error("failed to open store: {0}")]
    Store(#[from] playwatch_db::StoreError),
}

/// Wire the fetcher, directory client, store and sink into a [`Poller`].
/// Pre-seeded message ids from the configuration are written when no
/// reference exists yet.
pub async fn build_poller<A: MessageApi>(
    config: &Config,
    api: A,
) -> Result<Poller<A>, StartupError> {
    let fetcher = Arc::new(RateLimitedFetcher::new(FetcherConfig::from(config))?);
    let client = Arc::new(DirectoryClient::new(fetcher, config)?);
    let store = Store::open(&config.data_dir).await?;

    if let Some(id) = config.online_message_id {
        store.seed_message_ref(SummaryKind::Online, id).await?;
    }
    if let Some(id) = config.offline_message_id {
        store.seed_message_ref(SummaryKind::Offline, id).await?;
    }

    let sink = MessageSink::new(api, store.clone(), config.channel_id);
    Ok(Poller::new(client, store, sink, config))
}
