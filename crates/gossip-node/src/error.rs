//! Error types for the node.

use gossip_core::CoreError;
use gossip_store::StoreError;
use gossip_sync::SyncError;
use thiserror::Error;

/// Errors that can occur during node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Protocol or transport error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Malformed hash or metafile.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// File index error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl NodeError {
    /// True if the operation was aborted by its cancellation token.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, NodeError::Sync(SyncError::Cancelled))
    }
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
