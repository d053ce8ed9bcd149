//! The store operations the transfer pipeline depends on.

use std::future::Future;
use std::pin::Pin;

use chunklift_transfer::BlockId;

use crate::error::StoreError;

/// Boxed future returned by [`BlockStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Abstract destination object in a block store.
///
/// An implementation is bound to one container and one object name.
/// Keeping the pipeline behind this trait lets it run against a real
/// backend or an in-memory store in tests.
pub trait BlockStore: Send + Sync {
    /// Creates the destination container if it does not exist yet.
    fn ensure_container(&self) -> StoreFuture<'_, ()>;

    /// Stages one uncommitted block. The object is unchanged until commit.
    fn put_block<'a>(&'a self, id: &'a BlockId, data: Vec<u8>) -> StoreFuture<'a, ()>;

    /// Atomically assembles the object from staged blocks, in `ids` order.
    fn commit_block_list<'a>(&'a self, ids: &'a [BlockId]) -> StoreFuture<'a, ()>;

    /// Human-readable destination, for logs.
    fn describe(&self) -> String;
}
