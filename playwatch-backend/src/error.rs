use thiserror::Error;

/// Failure of a single outbound directory request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response body: {0}")]
    Decode(String),

    #[error("retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("fetcher is shut down")]
    Closed,
}

impl FetchError {
    /// Status code of a rejected request, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure pushing a summary to the chat platform.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("message not found")]
    NotFound,

    #[error("missing access to the channel")]
    Forbidden,

    #[error("chat api error: {0}")]
    Api(String),

    #[error(transparent)]
    Store(#[from] playwatch_db::StoreError),
}
