//! Block-oriented object store.
//!
//! Objects are written in two phases: blocks are staged one by one
//! under caller-chosen identifiers, then a single commit assembles the
//! staged blocks, in the order given, into the visible object.

pub mod azure;
pub mod error;
pub mod memory;
pub mod store;

pub use azure::AzureBlockBlob;
pub use error::StoreError;
pub use memory::MemoryBlockStore;
pub use store::{BlockStore, StoreFuture};
