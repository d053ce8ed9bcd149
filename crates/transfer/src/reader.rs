use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, TransferError};

/// How a single failing read is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed per read call. The call fails once the number of
    /// failed attempts exceeds this value.
    pub max_retries: u32,
    /// Fixed wait between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Result of one read attempt against the underlying stream.
#[derive(Debug)]
pub enum ReadOutcome {
    /// Bytes read. Zero means end of stream.
    Success(usize),
    /// Failure worth retrying after the policy delay.
    Transient(io::Error),
    /// Failure that retrying cannot fix.
    Fatal(io::Error),
}

/// Decides whether a read error is retried.
///
/// Network faults surface as many different kinds, so everything is
/// transient except errors that describe the caller or the platform.
pub fn classify_read_error(err: io::Error) -> ReadOutcome {
    match err.kind() {
        io::ErrorKind::InvalidInput
        | io::ErrorKind::PermissionDenied
        | io::ErrorKind::Unsupported
        | io::ErrorKind::OutOfMemory => ReadOutcome::Fatal(err),
        _ => ReadOutcome::Transient(err),
    }
}

/// A failed read attempt, reported before the retry decision is made.
#[derive(Debug, Clone)]
pub struct ReadRetry {
    /// 1-based count of failures for the current read call.
    pub attempt: u32,
    pub max_retries: u32,
    pub error: String,
}

/// Callback invoked for every failed read attempt.
pub type RetryCallback = Box<dyn Fn(&ReadRetry) + Send + Sync>;

/// Wraps a byte stream and retries transient read failures.
///
/// The failure counter is scoped to one [`read_at`](Self::read_at) call;
/// a read that eventually succeeds leaves no trace on later reads.
pub struct RetryingReader<R> {
    inner: R,
    policy: RetryPolicy,
    cancel: CancellationToken,
    on_retry: Option<RetryCallback>,
}

impl<R: AsyncRead + Unpin> RetryingReader<R> {
    /// Wraps `inner` with the given retry policy.
    pub fn new(inner: R, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            cancel: CancellationToken::new(),
            on_retry: None,
        }
    }

    /// Aborts pending reads and retry waits when `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Registers a callback for failed attempts.
    pub fn on_retry(mut self, callback: RetryCallback) -> Self {
        self.on_retry = Some(callback);
        self
    }

    /// Reads up to `count` bytes into `buf[offset..offset + count]`.
    ///
    /// Returns the number of bytes read, which may be fewer than
    /// requested. `Ok(0)` means the stream is exhausted.
    pub async fn read_at(
        &mut self,
        buf: &mut [u8],
        offset: usize,
        count: usize,
    ) -> Result<usize, TransferError> {
        let len = buf.len();
        let region = offset
            .checked_add(count)
            .and_then(|end| buf.get_mut(offset..end))
            .ok_or(TransferError::InvalidRange { offset, count, len })?;

        let mut failures: u32 = 0;
        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(TransferError::Cancelled),
                r = self.inner.read(region) => r,
            };
            let outcome = match result {
                Ok(n) => ReadOutcome::Success(n),
                Err(e) => classify_read_error(e),
            };

            let err = match outcome {
                ReadOutcome::Success(n) => {
                    trace!(offset, requested = count, read = n, "read ok");
                    return Ok(n);
                }
                ReadOutcome::Fatal(e) => {
                    warn!(error = %e, "read failed, not retryable");
                    return Err(TransferError::Io(e));
                }
                ReadOutcome::Transient(e) => e,
            };

            failures += 1;
            warn!(
                attempt = failures,
                max_retries = self.policy.max_retries,
                error = %err,
                "read failed"
            );
            if let Some(cb) = &self.on_retry {
                cb(&ReadRetry {
                    attempt: failures,
                    max_retries: self.policy.max_retries,
                    error: err.to_string(),
                });
            }

            if failures > self.policy.max_retries {
                return Err(TransferError::RetryExhausted {
                    attempts: failures,
                    source: err,
                });
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(TransferError::Cancelled),
                _ = tokio::time::sleep(self.policy.delay) => {}
            }
        }
    }

    /// Borrows the wrapped stream.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }
}
