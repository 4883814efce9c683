//! Outbound JSON fetches with a global concurrency bound and throttling retries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::FetchError;

/// Retry and concurrency settings for [`RateLimitedFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Requests allowed in flight at once across the whole process.
    pub max_concurrent: usize,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub max_backoff: Duration,
    pub request_timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 45,
            max_retries: 10,
            backoff_base: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&Config> for FetcherConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_concurrent: config.max_concurrent_requests,
            max_retries: config.max_retries,
            backoff_base: config.backoff_base,
            max_backoff: config.max_backoff,
            request_timeout: config.request_timeout,
        }
    }
}

enum Attempt {
    Done(Result<Value, FetchError>),
    /// Throttled; the server may have told us how long to wait.
    Throttled(Option<Duration>),
    /// Transport failure worth another try.
    Transient(reqwest::Error),
}

pub struct RateLimitedFetcher {
    client: Client,
    permits: Semaphore,
    config: FetcherConfig,
    throttled: AtomicU64,
}

impl RateLimitedFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            permits: Semaphore::new(config.max_concurrent.max(1)),
            config,
            throttled: AtomicU64::new(0),
        })
    }

    /// Number of 429 responses seen since startup.
    pub fn throttled_count(&self) -> u64 {
        self.throttled.load(Ordering::Relaxed)
    }

    /// GET `url` and decode the body as JSON.
    ///
    /// 429 responses and transport failures are retried up to `max_retries`
    /// times; any other non-200 status fails at once with the status and body.
    pub async fn fetch(&self, url: &str, headers: &HeaderMap) -> Result<Value, FetchError> {
        let mut attempt: u32 = 0;
        loop {
            let delay = match self.attempt(url, headers).await {
                Attempt::Done(result) => return result,
                Attempt::Throttled(retry_after) => {
                    let total = self.throttled.fetch_add(1, Ordering::Relaxed) + 1;
                    let delay = retry_after.unwrap_or_else(|| self.backoff(attempt));
                    warn!(
                        url,
                        attempt,
                        throttled_total = total,
                        delay_secs = delay.as_secs_f64(),
                        "rate limited, backing off"
                    );
                    delay
                }
                Attempt::Transient(e) => {
                    let delay = self.backoff(attempt);
                    warn!(
                        url,
                        attempt,
                        error = %e,
                        delay_secs = delay.as_secs_f64(),
                        "request failed, backing off"
                    );
                    delay
                }
            };

            if attempt >= self.config.max_retries {
                warn!(url, attempts = attempt + 1, "giving up");
                return Err(FetchError::RetriesExhausted {
                    attempts: attempt + 1,
                });
            }
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// One request, holding a permit until the body has been read.
    async fn attempt(&self, url: &str, headers: &HeaderMap) -> Attempt {
        let Ok(_permit) = self.permits.acquire().await else {
            return Attempt::Done(Err(FetchError::Closed));
        };

        let response = match self.client.get(url).headers(headers.clone()).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                return Attempt::Transient(e);
            }
            Err(e) => return Attempt::Done(Err(e.into())),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Attempt::Throttled(retry_after(response.headers()));
        }
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(url, status = status.as_u16(), %body, "fetch failed");
            return Attempt::Done(Err(FetchError::Status {
                status: status.as_u16(),
                body,
            }));
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return Attempt::Done(Err(e.into())),
        };
        debug!(url, len = bytes.len(), "fetched");
        Attempt::Done(
            serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string())),
        )
    }

    /// `min(base * 2^attempt, max_backoff)`
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.config
            .backoff_base
            .saturating_mul(factor)
            .min(self.config.max_backoff)
    }
}

/// Whole seconds from a `Retry-After` header, if present and numeric.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
