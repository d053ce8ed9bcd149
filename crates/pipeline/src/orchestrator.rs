//! End-to-end transfer: open, stream blocks, commit.
//!
//! Runs one transfer strictly sequentially: each block is read, hashed
//! and staged before the next read starts, so memory stays bounded by a
//! single block. The block list is committed once, after the last upload.

use std::time::{Duration, Instant};

use chunklift_blob::BlockStore;
use chunklift_transfer::{
    Block, BlockAccumulator, MAX_BLOCK_COUNT, ReadRetry, RetryingReader, StreamingHasher,
    TransferConfig,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::PipelineError;
use crate::source::ByteSource;
use crate::types::{TransferEvent, TransferReport, TransferState};
use crate::uploader::BlockUploader;

/// Capacity of the diagnostic event channel. Events beyond it are dropped.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Drives one transfer from a [`ByteSource`] into a [`BlockStore`].
pub struct TransferOrchestrator {
    config: TransferConfig,
    events_tx: mpsc::Sender<TransferEvent>,
    events_rx: Option<mpsc::Receiver<TransferEvent>>,
    cancel: CancellationToken,
    state: TransferState,
}

impl TransferOrchestrator {
    /// Creates an idle orchestrator.
    pub fn new(config: TransferConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
            state: TransferState::Idle,
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<TransferEvent>> {
        self.events_rx.take()
    }

    /// Returns a token that aborts the transfer at the next read or
    /// upload boundary.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Runs the transfer to completion.
    ///
    /// On failure nothing is committed; blocks staged so far stay in the
    /// store uncommitted. Elapsed time is reported either way.
    ///
    /// An invalid configuration or a token cancelled before the call is
    /// rejected up front and leaves the orchestrator `Idle`.
    pub async fn run(
        &mut self,
        source: &dyn ByteSource,
        store: &dyn BlockStore,
    ) -> Result<TransferReport, PipelineError> {
        if self.state != TransferState::Idle {
            return Err(PipelineError::Configuration(
                "orchestrator has already run".into(),
            ));
        }
        self.config.validate()?;
        self.check_cancelled()?;

        info!(
            source = %source.describe(),
            destination = %store.describe(),
            block_size = self.config.block_size,
            "transfer starting"
        );
        let started = Instant::now();
        let result = self.stream_and_commit(source, store).await;
        let elapsed = started.elapsed();

        let result = match result {
            Ok(mut report) => {
                report.elapsed = elapsed;
                self.set_state(TransferState::Done);
                info!(digest = %report.digest, "hash value computed");
                self.emit(TransferEvent::Digest(report.digest));
                Ok(report)
            }
            Err(PipelineError::Cancelled) => {
                self.set_state(TransferState::Cancelled);
                warn!("transfer cancelled");
                Err(PipelineError::Cancelled)
            }
            Err(e) => {
                self.set_state(TransferState::Failed);
                error!(error = %e, "transfer failed");
                Err(e)
            }
        };

        info!(elapsed_minutes = elapsed.as_secs_f64() / 60.0, "execution time");
        self.emit(TransferEvent::Finished {
            elapsed,
            error: result.as_ref().err().map(|e| e.to_string()),
        });
        result
    }

    async fn stream_and_commit(
        &mut self,
        source: &dyn ByteSource,
        store: &dyn BlockStore,
    ) -> Result<TransferReport, PipelineError> {
        let accumulator = BlockAccumulator::new(self.config.block_size)?;
        self.set_state(TransferState::Streaming);
        store
            .ensure_container()
            .await
            .map_err(PipelineError::Container)?;

        let opened = source.open().await?;
        let declared_len = opened.declared_len.ok_or_else(|| {
            PipelineError::Configuration(format!(
                "{} did not declare a content length",
                source.describe()
            ))
        })?;
        let blocks_needed = self.config.block_count(declared_len);
        if blocks_needed > MAX_BLOCK_COUNT {
            return Err(PipelineError::Configuration(format!(
                "{declared_len} bytes need {blocks_needed} blocks of {} bytes, \
                 more than the {MAX_BLOCK_COUNT} a committed object may hold",
                self.config.block_size
            )));
        }
        info!(declared_len, blocks = blocks_needed, "source opened");

        let retry_tx = self.events_tx.clone();
        let mut reader = RetryingReader::new(opened.reader, self.config.retry.clone())
            .with_cancel(self.cancel.clone())
            .on_retry(Box::new(move |r: &ReadRetry| {
                let _ = retry_tx.try_send(TransferEvent::ReadRetry {
                    attempt: r.attempt,
                    max_retries: r.max_retries,
                    error: r.error.clone(),
                });
            }));
        let mut hasher = StreamingHasher::new();
        let mut uploader = BlockUploader::new(store);

        let mut remaining = declared_len;
        let mut sequence: u64 = 0;
        let mut digest = None;

        while remaining > 0 {
            self.check_cancelled()?;

            let requested = remaining.min(accumulator.block_size() as u64);
            let data = accumulator.fill(&mut reader, remaining).await?;
            let bytes_read = data.len();
            if (bytes_read as u64) < requested {
                let received = declared_len - remaining + bytes_read as u64;
                warn!(received, declared_len, "source ended before its declared length");
                return Err(PipelineError::Source(format!(
                    "source ended after {received} of {declared_len} declared bytes"
                )));
            }

            sequence += 1;
            remaining -= bytes_read as u64;
            info!(sequence, bytes_read, "bytes read");
            info!(bytes_remaining = remaining, "bytes remaining");
            self.emit(TransferEvent::BlockRead {
                sequence,
                bytes_read,
                bytes_remaining: remaining,
            });

            if remaining == 0 {
                digest = Some(hasher.finalize_with(&data)?);
            } else {
                hasher.update(&data)?;
            }

            let block = Block::new(&self.config.block_id_prefix, sequence, data)?;
            let id = block.id.clone();
            self.check_cancelled()?;
            uploader.upload(block).await?;
            self.emit(TransferEvent::BlockStaged { sequence, id });
        }

        // Only an empty source leaves the digest unsealed here.
        let digest = match digest {
            Some(d) => d,
            None => hasher.finalize()?,
        };

        self.set_state(TransferState::Committing);
        self.check_cancelled()?;
        let block_ids = uploader.into_log();
        store
            .commit_block_list(&block_ids)
            .await
            .map_err(PipelineError::Commit)?;
        info!(blocks = block_ids.len(), bytes = declared_len, "block list committed");

        Ok(TransferReport {
            digest,
            block_ids,
            bytes: declared_len,
            declared_len,
            elapsed: Duration::ZERO,
        })
    }

    fn check_cancelled(&self) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn set_state(&mut self, state: TransferState) {
        debug!(from = ?self.state, to = ?state, "state changed");
        self.state = state;
        self.emit(TransferEvent::StateChanged(state));
    }

    /// Sends a diagnostic event without waiting; a full channel drops it.
    fn emit(&self, event: TransferEvent) {
        if let Err(e) = self.events_tx.try_send(event) {
            trace!("event dropped: {e}");
        }
    }
}
