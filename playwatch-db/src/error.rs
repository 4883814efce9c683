use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode log: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid message reference {0:?}")]
    InvalidMessageRef(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
