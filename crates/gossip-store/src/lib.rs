//! # Gossip Store
//!
//! The node-local state the transfer and anti-entropy protocols consult:
//! a routing table, a content-addressed file index, and the per-origin
//! message log.
//!
//! ## Overview
//!
//! Each collaborator sits behind an async trait so the protocols never touch
//! shared maps directly. The in-memory implementations own their state behind
//! a lock and are safe to share across concurrent download tasks.
//!
//! ## Key Types
//!
//! - [`Router`] / [`MemoryRouter`] - peer name to next-hop address
//! - [`FileIndex`] / [`MemoryFileIndex`] - hash to bytes, chunk storage, metafiles
//! - [`MessageLog`] / [`MemoryMessageLog`] - rumors and the local vector clock
//! - [`SharedFile`] - a shared or downloading file, shared by reference
//! - [`ChunkProgress`] - what to fetch after a data reply was stored
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gossip_store::{FileIndex, MemoryFileIndex};
//!
//! async fn example() {
//!     let index = MemoryFileIndex::new();
//!     let file = index.index_path("notes.txt").await.unwrap();
//!     println!("{} -> {}", file.filename(), file.metahash().to_hex());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Quiet failures**: unknown peers, unknown hashes and name collisions are
//!   `None` / empty results, not errors.
//! - **Servable downloads**: chunks and metafiles received from peers are
//!   indexed by hash as soon as they are stored, so a downloading node can
//!   serve them onward.

pub mod error;
pub mod memory;
pub mod shared;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::{MemoryFileIndex, MemoryMessageLog, MemoryRouter};
pub use shared::SharedFile;
pub use traits::{ChunkProgress, FileIndex, MessageLog, Router};
