//! Error types for the sync module.

use thiserror::Error;

/// Errors that can occur during transfer and anti-entropy operations.
///
/// Quiet failures (unknown route, exhausted hop limit, corrupt reply) are not
/// errors; they surface as outcomes of the handlers instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A packet could not be serialized (or exceeds a datagram).
    #[error("encode failed: {0}")]
    EncodeFailed(String),

    /// A datagram did not hold a well-formed packet.
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    /// The transport refused to send a datagram.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Transport-level error while receiving.
    #[error("transport error: {0}")]
    TransportError(String),

    /// A pending request was aborted by its cancellation token.
    #[error("request cancelled")]
    Cancelled,
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
