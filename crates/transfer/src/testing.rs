//! Scripted byte sources for transfer tests.
//!
//! Available behind the `test-support` feature or in `#[cfg(test)]`.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

/// Deterministic test payload of `len` bytes.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// One scripted response to a read call.
#[derive(Debug, Clone, Copy)]
pub enum ReadStep {
    /// Deliver at most this many bytes.
    Data(usize),
    /// Fail with an error of this kind.
    Fail(io::ErrorKind),
}

/// In-memory [`AsyncRead`] that replays a script of partial reads and
/// failures, then serves the rest of its data.
#[derive(Debug)]
pub struct ScriptedReader {
    data: Vec<u8>,
    pos: usize,
    script: VecDeque<ReadStep>,
    chunk_limit: Option<usize>,
    reads: usize,
    failures: usize,
    largest_request: usize,
}

impl ScriptedReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            script: VecDeque::new(),
            chunk_limit: None,
            reads: 0,
            failures: 0,
            largest_request: 0,
        }
    }

    /// Steps replayed before unscripted reads.
    pub fn with_script(mut self, steps: Vec<ReadStep>) -> Self {
        self.script = steps.into();
        self
    }

    /// Caps every unscripted read at `limit` bytes.
    pub fn with_chunk_limit(mut self, limit: usize) -> Self {
        self.chunk_limit = Some(limit);
        self
    }

    /// Successful read calls, including end-of-stream reads.
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Injected failures returned so far.
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Largest buffer any read call offered.
    pub fn largest_request(&self) -> usize {
        self.largest_request
    }

    /// Bytes not yet delivered.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl AsyncRead for ScriptedReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.largest_request = this.largest_request.max(buf.remaining());

        let limit = match this.script.pop_front() {
            Some(ReadStep::Fail(kind)) => {
                this.failures += 1;
                return Poll::Ready(Err(io::Error::new(kind, "injected read fault")));
            }
            Some(ReadStep::Data(n)) => n,
            None => this.chunk_limit.unwrap_or(usize::MAX),
        };

        let n = limit.min(this.remaining()).min(buf.remaining());
        buf.put_slice(&this.data[this.pos..this.pos + n]);
        this.pos += n;
        this.reads += 1;
        Poll::Ready(Ok(()))
    }
}
