//! Error types for the gossip core.

use thiserror::Error;

/// Errors that can occur when building core values from untrusted bytes.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid hash length: expected 32 bytes, got {0}")]
    InvalidHashLength(usize),

    #[error("invalid metafile length {0}: not a multiple of 32")]
    InvalidMetafileLength(usize),

    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
