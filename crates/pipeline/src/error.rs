//! Pipeline error types.

use chunklift_blob::StoreError;
use chunklift_transfer::{BlockId, TransferError};

/// Errors that abort a transfer.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("source error: {0}")]
    Source(String),

    #[error("container error: {0}")]
    Container(#[source] StoreError),

    #[error("transfer error: {0}")]
    Transfer(#[source] TransferError),

    #[error("upload of block {sequence} ({id}) failed: {source}")]
    Upload {
        sequence: u64,
        id: BlockId,
        #[source]
        source: StoreError,
    },

    #[error("commit failed: {0}")]
    Commit(#[source] StoreError),

    #[error("cancelled")]
    Cancelled,
}

impl From<TransferError> for PipelineError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::Cancelled => Self::Cancelled,
            TransferError::InvalidBlockSize(_) => Self::Configuration(err.to_string()),
            other => Self::Transfer(other),
        }
    }
}

impl PipelineError {
    /// Whether the read path gave up after exhausting its retries.
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(
            self,
            Self::Transfer(TransferError::RetryExhausted { .. })
        )
    }
}
