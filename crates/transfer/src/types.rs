use crate::block_id::{BlockId, DEFAULT_BLOCK_ID_PREFIX};
use crate::reader::RetryPolicy;
use crate::{DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE, TransferError};

/// One contiguous slice of the source, in transfer order.
#[derive(Debug, Clone)]
pub struct Block {
    /// 1-based position in the stream.
    pub sequence: u64,
    /// Identifier derived from `sequence`.
    pub id: BlockId,
    /// Raw block payload.
    pub data: Vec<u8>,
}

impl Block {
    /// Builds a block, deriving its identifier from `sequence`.
    pub fn new(prefix: &str, sequence: u64, data: Vec<u8>) -> Result<Self, TransferError> {
        Ok(Self {
            sequence,
            id: BlockId::for_sequence(prefix, sequence)?,
            data,
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Policy for one transfer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Maximum bytes per block.
    pub block_size: usize,
    /// Retry policy for source reads.
    pub retry: RetryPolicy,
    /// Text prefix of every block identifier.
    pub block_id_prefix: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            retry: RetryPolicy::default(),
            block_id_prefix: DEFAULT_BLOCK_ID_PREFIX.to_string(),
        }
    }
}

impl TransferConfig {
    /// Checks the block size against the store ceiling.
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(TransferError::InvalidBlockSize(self.block_size));
        }
        Ok(())
    }

    /// Number of blocks a source of `total_bytes` splits into.
    pub fn block_count(&self, total_bytes: u64) -> u64 {
        if self.block_size == 0 {
            return 0;
        }
        total_bytes.div_ceil(self.block_size as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = TransferConfig::default();
        assert_eq!(config.block_size, 100 * 1024 * 1024);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.delay.as_secs(), 10);
        assert_eq!(config.block_id_prefix, "largefile1BlockId");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_block_sizes() {
        let zero = TransferConfig {
            block_size: 0,
            ..TransferConfig::default()
        };
        assert!(matches!(zero.validate(), Err(TransferError::InvalidBlockSize(0))));

        let big = TransferConfig {
            block_size: MAX_BLOCK_SIZE + 1,
            ..TransferConfig::default()
        };
        assert!(big.validate().is_err());
    }

    #[test]
    fn block_count_is_ceiling() {
        let config = TransferConfig {
            block_size: 100,
            ..TransferConfig::default()
        };
        assert_eq!(config.block_count(0), 0);
        assert_eq!(config.block_count(1), 1);
        assert_eq!(config.block_count(100), 1);
        assert_eq!(config.block_count(101), 2);
        assert_eq!(config.block_count(250), 3);
    }

    #[test]
    fn block_id_follows_sequence() {
        let block = Block::new("p", 3, b"xyz".to_vec()).unwrap();
        assert_eq!(block.len(), 3);
        assert!(!block.is_empty());
        assert_eq!(block.id.decode().as_deref(), Some("p0000003"));
    }
}
