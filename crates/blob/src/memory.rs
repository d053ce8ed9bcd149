//! In-process block store.
//!
//! Keeps staged blocks and the committed object in memory and records
//! every call, so pipelines can be exercised without a backend. Failures
//! can be injected for individual uploads or for the commit.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chunklift_transfer::BlockId;

use crate::error::StoreError;
use crate::store::{BlockStore, StoreFuture};

/// Block store held entirely in memory.
#[derive(Default)]
pub struct MemoryBlockStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    container_ready: bool,
    ensure_calls: usize,
    staged: HashMap<BlockId, Vec<u8>>,
    /// Identifiers in the order `put_block` was called.
    put_log: Vec<BlockId>,
    commits: Vec<Vec<BlockId>>,
    committed: Option<Vec<u8>>,
    largest_block: usize,
    /// 1-based `put_block` call that fails.
    fail_put_at: Option<usize>,
    fail_commit: bool,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the `n`-th `put_block` call (1-based) fail.
    pub fn fail_put_on(self, n: usize) -> Self {
        self.lock().fail_put_at = Some(n);
        self
    }

    /// Makes every commit fail.
    pub fn fail_commit(self) -> Self {
        self.lock().fail_commit = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `ensure_container` has run.
    pub fn container_ready(&self) -> bool {
        self.lock().container_ready
    }

    /// Number of `ensure_container` calls.
    pub fn ensure_calls(&self) -> usize {
        self.lock().ensure_calls
    }

    /// Identifiers of every `put_block` call, in call order.
    pub fn put_log(&self) -> Vec<BlockId> {
        self.lock().put_log.clone()
    }

    /// Blocks staged but not yet part of a committed object, in upload order.
    pub fn staged_block_ids(&self) -> Vec<BlockId> {
        let inner = self.lock();
        let mut seen = Vec::new();
        for id in &inner.put_log {
            if inner.staged.contains_key(id) && !seen.contains(id) {
                seen.push(id.clone());
            }
        }
        seen
    }

    /// Every block list committed so far.
    pub fn commits(&self) -> Vec<Vec<BlockId>> {
        self.lock().commits.clone()
    }

    /// Bytes of the committed object, if any commit succeeded.
    pub fn committed_object(&self) -> Option<Vec<u8>> {
        self.lock().committed.clone()
    }

    /// Largest payload passed to `put_block`.
    pub fn largest_block(&self) -> usize {
        self.lock().largest_block
    }
}

impl BlockStore for MemoryBlockStore {
    fn ensure_container(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.ensure_calls += 1;
            inner.container_ready = true;
            Ok(())
        })
    }

    fn put_block<'a>(&'a self, id: &'a BlockId, data: Vec<u8>) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut inner = self.lock();
            if !inner.container_ready {
                return Err(StoreError::Backend("container does not exist".into()));
            }
            inner.put_log.push(id.clone());
            if inner.fail_put_at == Some(inner.put_log.len()) {
                return Err(StoreError::Backend(format!("injected upload failure for {id}")));
            }
            inner.largest_block = inner.largest_block.max(data.len());
            inner.staged.insert(id.clone(), data);
            Ok(())
        })
    }

    fn commit_block_list<'a>(&'a self, ids: &'a [BlockId]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.commits.push(ids.to_vec());
            if inner.fail_commit {
                return Err(StoreError::Backend("injected commit failure".into()));
            }

            let mut object = Vec::new();
            for id in ids {
                let block = inner
                    .staged
                    .get(id)
                    .ok_or_else(|| StoreError::UnknownBlock(id.to_string()))?;
                object.extend_from_slice(block);
            }
            // Committing discards every staged block.
            inner.staged.clear();
            inner.committed = Some(object);
            Ok(())
        })
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}
