//! # Gossip Sync
//!
//! The two protocols of the gossip node:
//!
//! - **Chunked transfer**: content-addressed, hash-verified file download over
//!   an unreliable datagram transport, with hop-limited multi-hop relaying.
//! - **Anti-entropy**: vector-clock comparison that decides whether to push a
//!   rumor, ask the peer to push, or do nothing.
//!
//! ## Key Properties
//!
//! - **Integrity**: every reply is checked against the hash it claims to carry
//! - **Loss tolerant**: requests are resent until a correlated reply arrives
//! - **Duplicate tolerant**: each pending record resolves exactly once, and one
//!   request per hash is on the wire however many files need it
//! - **Bounded relaying**: each hop decrements the hop limit; zero drops
//!
//! ## Download Flow
//!
//! ```text
//! Downloader                           Source
//!   |-- DataRequest(metahash) --------->|
//!   |<- DataReply(metafile) ------------|
//!   |-- DataRequest(chunk 1) ---------->|
//!   |<- DataReply(chunk 1) -------------|
//!   |            ...                    |
//!   |-- DataRequest(chunk N) ---------->|
//!   |<- DataReply(chunk N) -------------|   file reconstructed
//! ```
//!
//! Each request is resent every resend interval until its reply arrives.
//! Every reply that verifies and resolves a pending request triggers the
//! request for the next chunk.
//!
//! ## Anti-Entropy Flow
//!
//! ```text
//! Node A                              Node B
//!   |-------- Status(clock A) ------->|
//!   |<------- Rumor (A lacks it) -----|   B pushes
//!   |-------- Status(clock A') ------>|
//!   |                                 |   B: in sync, nothing sent
//! ```

pub mod anti_entropy;
pub mod codec;
pub mod error;
pub mod messages;
pub mod timeouts;
pub mod transfer;
pub mod transport;

pub use anti_entropy::{AntiEntropy, Reconciliation};
pub use codec::{decode, encode, MAX_DATAGRAM_SIZE};
pub use error::{Result, SyncError};
pub use messages::{
    DataReply, DataRequest, GossipPacket, PeerStatus, Routed, StatusPacket, DEFAULT_HOP_LIMIT,
};
pub use timeouts::{PendingRequest, Registration, TimeoutTracker};
pub use transfer::{DataTransfer, DownloadOutcome, Handled, RequestOutcome, TransferConfig};
pub use transport::{
    memory::MemoryNetwork, memory::MemoryTransport, send_packet, Transport, UdpTransport,
};
