//! Bounded-memory block transfer primitives.
//!
//! Reads a byte stream one block at a time, retrying transient read
//! failures, and hashes the stream incrementally in transfer order.

mod accumulator;
mod block_id;
mod hasher;
mod reader;
mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

use std::time::Duration;

pub use accumulator::BlockAccumulator;
pub use block_id::{BlockId, DEFAULT_BLOCK_ID_PREFIX, MAX_SEQUENCE};
pub use hasher::{ContentDigest, StreamingHasher, digest_bytes};
pub use reader::{ReadOutcome, ReadRetry, RetryCallback, RetryPolicy, RetryingReader, classify_read_error};
pub use types::{Block, TransferConfig};

/// Largest block a block store accepts: 100 MiB.
pub const MAX_BLOCK_SIZE: usize = 100 * 1024 * 1024;

/// Default block size. Uses the full store ceiling.
pub const DEFAULT_BLOCK_SIZE: usize = MAX_BLOCK_SIZE;

/// Largest number of blocks a committed object may have.
pub const MAX_BLOCK_COUNT: u64 = 50_000;

/// Default number of retries for a single failing read.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default wait between read retries.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("read failed after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("digest already sealed")]
    DigestSealed,

    #[error("invalid block size: {0} (must be 1..={MAX_BLOCK_SIZE})")]
    InvalidBlockSize(usize),

    #[error("block sequence {0} out of range (1..={MAX_SEQUENCE})")]
    InvalidSequence(u64),

    #[error("read range {offset}+{count} exceeds buffer of {len} bytes")]
    InvalidRange {
        offset: usize,
        count: usize,
        len: usize,
    },
}
