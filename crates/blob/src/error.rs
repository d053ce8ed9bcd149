//! Store error types.

/// Errors produced by a block store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid store URL: {0}")]
    InvalidUrl(String),

    #[error("unknown block id: {0}")]
    UnknownBlock(String),

    #[error("{0}")]
    Backend(String),
}
