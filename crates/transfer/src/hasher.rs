use std::fmt;

use sha2::{Digest, Sha256};

use crate::TransferError;

/// Final SHA-256 digest of a transferred stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Uppercase hex, no separators (64 chars).
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Computes the SHA-256 of `data` in one pass.
pub fn digest_bytes(data: &[u8]) -> ContentDigest {
    ContentDigest(Sha256::digest(data).into())
}

/// Running SHA-256 over a stream fed block by block, in transfer order.
///
/// Non-final blocks go through [`update`](Self::update); the last block
/// goes through [`finalize_with`](Self::finalize_with), which seals the
/// context. A sealed hasher rejects further input.
#[derive(Clone, Default)]
pub struct StreamingHasher {
    ctx: Option<Sha256>,
    sealed: bool,
    bytes: u64,
    updates: u64,
}

impl StreamingHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a non-final block.
    pub fn update(&mut self, data: &[u8]) -> Result<(), TransferError> {
        if self.sealed {
            return Err(TransferError::DigestSealed);
        }
        self.ctx.get_or_insert_with(Sha256::new).update(data);
        self.bytes += data.len() as u64;
        self.updates += 1;
        Ok(())
    }

    /// Feeds the last block and seals the digest.
    pub fn finalize_with(&mut self, data: &[u8]) -> Result<ContentDigest, TransferError> {
        self.update(data)?;
        self.finalize()
    }

    /// Seals the digest without further input.
    pub fn finalize(&mut self) -> Result<ContentDigest, TransferError> {
        if self.sealed {
            return Err(TransferError::DigestSealed);
        }
        self.sealed = true;
        let ctx = self.ctx.take().unwrap_or_default();
        Ok(ContentDigest(ctx.finalize().into()))
    }

    /// Bytes fed so far.
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes
    }

    /// Number of update calls so far, including the terminal one.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }
}
