//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Received bytes could not be interpreted.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A file with this name is already shared.
    #[error("file already exists: {0}")]
    FileExists(String),

    /// Malformed core value (hash, metafile).
    #[error("core error: {0}")]
    Core(#[from] gossip_core::CoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
