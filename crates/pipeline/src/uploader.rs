//! Stages blocks in the store and keeps the commit order.

use chunklift_blob::BlockStore;
use chunklift_transfer::{Block, BlockId};
use tracing::debug;

use crate::error::PipelineError;

/// Uploads blocks one at a time and records their identifiers.
///
/// Uploads are not retried; the first failure ends the transfer.
pub struct BlockUploader<'a> {
    store: &'a dyn BlockStore,
    log: Vec<BlockId>,
}

impl<'a> BlockUploader<'a> {
    pub fn new(store: &'a dyn BlockStore) -> Self {
        Self {
            store,
            log: Vec::new(),
        }
    }

    /// Stages `block` and appends its identifier to the commit log.
    ///
    /// The payload is moved into the store call and released when the
    /// upload finishes.
    pub async fn upload(&mut self, block: Block) -> Result<(), PipelineError> {
        let Block { sequence, id, data } = block;
        let bytes = data.len();

        self.store
            .put_block(&id, data)
            .await
            .map_err(|source| PipelineError::Upload {
                sequence,
                id: id.clone(),
                source,
            })?;

        debug!(sequence, block = %id, bytes, "block uploaded");
        self.log.push(id);
        Ok(())
    }

    /// Identifiers uploaded so far, in upload order.
    pub fn log(&self) -> &[BlockId] {
        &self.log
    }

    /// Consumes the uploader, returning the commit log.
    pub fn into_log(self) -> Vec<BlockId> {
        self.log
    }
}

#[cfg(test)]
mod tests {
    use chunklift_blob::MemoryBlockStore;

    use super::*;

    #[tokio::test]
    async fn records_ids_in_call_order() {
        let store = MemoryBlockStore::new();
        store.ensure_container().await.unwrap();
        let mut uploader = BlockUploader::new(&store);

        for seq in 1..=3u64 {
            let block = Block::new("u", seq, vec![seq as u8; 4]).unwrap();
            uploader.upload(block).await.unwrap();
        }

        let expected: Vec<BlockId> = (1..=3u64)
            .map(|s| BlockId::for_sequence("u", s).unwrap())
            .collect();
        assert_eq!(uploader.log(), expected.as_slice());
        assert_eq!(store.put_log(), expected);
        assert_eq!(uploader.into_log(), expected);
    }

    #[tokio::test]
    async fn failure_is_not_logged() {
        let store = MemoryBlockStore::new().fail_put_on(2);
        store.ensure_container().await.unwrap();
        let mut uploader = BlockUploader::new(&store);

        uploader
            .upload(Block::new("u", 1, vec![1]).unwrap())
            .await
            .unwrap();
        let err = uploader
            .upload(Block::new("u", 2, vec![2]).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Upload { sequence: 2, .. }));
        assert_eq!(uploader.log().len(), 1);
        // The failing block reached the store exactly once.
        assert_eq!(
            store.put_log(),
            vec![
                BlockId::for_sequence("u", 1).unwrap(),
                BlockId::for_sequence("u", 2).unwrap(),
            ]
        );
    }
}
