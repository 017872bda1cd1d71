//! Rumor messages: entries of an origin's message stream.

use serde::{Deserialize, Serialize};

/// A single message in an origin's stream.
///
/// `id` is the message's sequence number in that stream, starting at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RumorMessage {
    /// Name of the peer that authored the message.
    pub origin: String,
    /// Sequence number within the origin's stream.
    pub id: u32,
    /// Message body.
    pub text: String,
}

impl RumorMessage {
    pub fn new(origin: impl Into<String>, id: u32, text: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            id,
            text: text.into(),
        }
    }
}
