use tokio::io::AsyncRead;
use tracing::debug;

use crate::reader::RetryingReader;
use crate::{MAX_BLOCK_SIZE, TransferError};

/// Collects exactly one block's worth of bytes from a [`RetryingReader`].
#[derive(Debug, Clone, Copy)]
pub struct BlockAccumulator {
    block_size: usize,
}

impl BlockAccumulator {
    /// Creates an accumulator for blocks of at most `block_size` bytes.
    pub fn new(block_size: usize) -> Result<Self, TransferError> {
        if block_size == 0 || block_size > MAX_BLOCK_SIZE {
            return Err(TransferError::InvalidBlockSize(block_size));
        }
        Ok(Self { block_size })
    }

    /// Target block size in bytes.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Fills a buffer of `min(block_size, remaining)` bytes.
    ///
    /// Partial reads accumulate at a running offset. Stops early if the
    /// stream ends, returning a short block; the returned buffer is
    /// truncated to the bytes actually filled. Returns an empty buffer
    /// when `remaining` is zero.
    pub async fn fill<R: AsyncRead + Unpin>(
        &self,
        reader: &mut RetryingReader<R>,
        remaining: u64,
    ) -> Result<Vec<u8>, TransferError> {
        let target = remaining.min(self.block_size as u64) as usize;
        let mut buf = vec![0u8; target];
        let mut filled = 0usize;

        while filled < target {
            let n = reader.read_at(&mut buf, filled, target - filled).await?;
            if n == 0 {
                debug!(filled, target, "stream ended mid-block");
                break;
            }
            filled += n;
            debug!(read = n, filled, target, "accumulated");
        }

        buf.truncate(filled);
        Ok(buf)
    }
}
