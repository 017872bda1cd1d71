//! Collaborator traits: the abstract interfaces the protocols consume.
//!
//! Implementations must be safe to call from many concurrent tasks; the
//! protocols hold `Arc<dyn Trait>` handles and never lock anything themselves.

use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::Bytes;
use gossip_core::{ContentHash, RumorMessage, VectorClock};

use crate::error::Result;
use crate::shared::SharedFile;

/// What to do after a data reply was handed to the file index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkProgress {
    /// Fetch chunk `index` from `source`.
    Next {
        /// 1-based chunk index.
        index: u64,
        /// Peer the file is downloaded from.
        source: String,
    },
    /// Every chunk is stored; the file is reconstructed.
    Complete,
}

/// Peer name to next-hop address resolution.
#[async_trait]
pub trait Router: Send + Sync {
    /// Next-hop address for `peer`, if a route is known.
    async fn get_target(&self, peer: &str) -> Option<SocketAddr>;

    /// Record `addr` as the route to `peer` unless one exists already.
    async fn add_contact_if_absent(&self, peer: &str, addr: SocketAddr);

    /// Record `addr` as the route to `peer`, replacing any existing one.
    async fn set_contact(&self, peer: &str, addr: SocketAddr);
}

/// Content-addressed file index.
#[async_trait]
pub trait FileIndex: Send + Sync {
    /// Bytes stored under `hash` (a chunk or a metafile); empty if unknown.
    async fn get_data_from_hash(&self, hash: &ContentHash) -> Bytes;

    /// Store the payload of a verified data reply.
    ///
    /// `chunk_index` 0 means the payload is the file's metafile; any other
    /// value is the 1-based chunk index.
    async fn handle_data_reply(
        &self,
        file: &SharedFile,
        chunk_index: u64,
        data: Bytes,
    ) -> Result<ChunkProgress>;

    /// Register a file to be downloaded from `source`.
    ///
    /// Returns `None` if `filename` is already taken.
    async fn add_mono_source_file(
        &self,
        filename: &str,
        source: &str,
        metahash: ContentHash,
    ) -> Option<SharedFile>;

    /// Look up a file by name.
    async fn shared_file(&self, filename: &str) -> Option<SharedFile>;
}

/// Per-origin message log and the vector clock derived from it.
#[async_trait]
pub trait MessageLog: Send + Sync {
    /// A message we hold that `peer` does not, if any.
    async fn get_unknown_message_target(&self, peer: &VectorClock) -> Option<RumorMessage>;

    /// True if we have at least everything `peer` reports.
    async fn is_local_status_complete(&self, peer: &VectorClock) -> bool;

    /// The local vector clock.
    async fn get_vector_clock(&self) -> VectorClock;

    /// Append `rumor` if it is the next expected message of its origin.
    ///
    /// Returns `false` for duplicates and out-of-order messages.
    async fn insert(&self, rumor: RumorMessage) -> bool;

    /// Append a new message to `origin`'s stream with the next free id.
    async fn publish(&self, origin: &str, text: &str) -> RumorMessage;
}
