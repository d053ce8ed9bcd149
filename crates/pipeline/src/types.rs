//! Data types for the transfer pipeline.

use std::time::Duration;

use chunklift_transfer::{BlockId, ContentDigest};

/// Lifecycle of one transfer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Streaming,
    Committing,
    Done,
    Failed,
    Cancelled,
}

/// Diagnostic record emitted during a transfer.
#[derive(Debug, Clone)]
pub enum TransferEvent {
    /// State machine transition.
    StateChanged(TransferState),
    /// A block was accumulated from the source.
    BlockRead {
        sequence: u64,
        bytes_read: usize,
        bytes_remaining: u64,
    },
    /// A source read failed and may be retried.
    ReadRetry {
        attempt: u32,
        max_retries: u32,
        error: String,
    },
    /// A block was staged in the store.
    BlockStaged { sequence: u64, id: BlockId },
    /// The transfer committed; the digest is final.
    Digest(ContentDigest),
    /// The run ended. `error` is `None` on success.
    Finished {
        elapsed: Duration,
        error: Option<String>,
    },
}

/// Outcome of a successful transfer.
#[derive(Debug, Clone)]
pub struct TransferReport {
    /// SHA-256 of every source byte, in order.
    pub digest: ContentDigest,
    /// Committed block identifiers, in object order.
    pub block_ids: Vec<BlockId>,
    /// Bytes read from the source and uploaded.
    pub bytes: u64,
    /// Length the source declared up front.
    pub declared_len: u64,
    pub elapsed: Duration,
}

impl TransferReport {
    pub fn block_count(&self) -> usize {
        self.block_ids.len()
    }

    /// Elapsed wall-clock time in minutes.
    pub fn elapsed_minutes(&self) -> f64 {
        self.elapsed.as_secs_f64() / 60.0
    }
}
