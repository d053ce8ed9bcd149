use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::TransferError;

/// Prefix used for block identifiers unless configured otherwise.
pub const DEFAULT_BLOCK_ID_PREFIX: &str = "largefile1BlockId";

/// Highest sequence number that fits the 7-digit identifier format.
pub const MAX_SEQUENCE: u64 = 9_999_999;

/// Opaque, base64-encoded block identifier.
///
/// Derived only from the block's sequence number, never its content, so
/// identifiers of the same object are equal-length and sort in
/// sequence order once decoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(String);

impl BlockId {
    /// Builds the identifier for 1-based `sequence`: `prefix` followed by
    /// the zero-padded sequence number, base64-encoded.
    pub fn for_sequence(prefix: &str, sequence: u64) -> Result<Self, TransferError> {
        if sequence == 0 || sequence > MAX_SEQUENCE {
            return Err(TransferError::InvalidSequence(sequence));
        }
        let raw = format!("{prefix}{sequence:07}");
        Ok(Self(STANDARD.encode(raw.as_bytes())))
    }

    /// The encoded identifier as sent to the store.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes the identifier back to its raw text, if it is valid base64 UTF-8.
    pub fn decode(&self) -> Option<String> {
        let bytes = STANDARD.decode(&self.0).ok()?;
        String::from_utf8(bytes).ok()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
