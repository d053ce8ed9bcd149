//! Large-file transfer from an HTTP source into a block store.
//!
//! Memory stays bounded by one block no matter how large the source is.
//!
//! # Pipeline
//!
//! 1. **Open**: ensure the container exists, open the source and read
//!    its declared length
//! 2. **Accumulate**: fill one block, retrying transient read failures
//! 3. **Hash**: feed the block into the running SHA-256
//! 4. **Stage**: upload the block under its sequence-derived identifier
//! 5. **Commit**: assemble the staged blocks, in order, into the object
//!
//! Steps 2–4 repeat strictly sequentially until the source is drained.

pub mod error;
pub mod orchestrator;
pub mod source;
pub mod types;
pub mod uploader;

pub use error::PipelineError;
pub use orchestrator::TransferOrchestrator;
pub use source::{ByteSource, HttpSource, OpenedSource, SourceReader};
pub use types::{TransferEvent, TransferReport, TransferState};
pub use uploader::BlockUploader;
