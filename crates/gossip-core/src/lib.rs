//! # Gossip Core
//!
//! Pure primitives for the gossip node: content hashes, metafiles, vector
//! clocks, and rumor messages.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over the data structures the transfer and anti-entropy protocols exchange.
//!
//! ## Key Types
//!
//! - [`ContentHash`] - Content address of a chunk or metafile (Blake3)
//! - [`Metafile`] - Ordered list of chunk hashes describing a file
//! - [`VectorClock`] - Per-origin "next expected sequence number" map
//! - [`RumorMessage`] - A single message of an origin's stream
//!
//! ## Anti-Entropy Decision
//!
//! [`clock::decide`] compares two vector clocks and says whether the local node
//! should push a rumor, request a pull, or consider itself in sync. It is a pure
//! function of the two clocks.

pub mod clock;
pub mod error;
pub mod hash;
pub mod metafile;
pub mod rumor;

pub use clock::{decide, Decision, VectorClock};
pub use error::{CoreError, Result};
pub use hash::{ContentHash, HASH_SIZE};
pub use metafile::{split_chunks, Metafile, CHUNK_SIZE};
pub use rumor::RumorMessage;
