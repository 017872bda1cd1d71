//! # Gossip Node
//!
//! A peer in a gossip network: it spreads short rumor messages by vector-clock
//! anti-entropy and shares files by a chunked, hash-verified transfer that is
//! relayed hop by hop between peers.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gossip_node::{Node, NodeConfig};
//! use gossip_node::sync::DownloadOutcome;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn example() -> gossip_node::Result<()> {
//!     let node = Arc::new(Node::bind(NodeConfig::named("alice"), "127.0.0.1:5000".parse().unwrap()).await?);
//!     node.add_peer("bob", "127.0.0.1:5001".parse().unwrap()).await;
//!
//!     let cancel = CancellationToken::new();
//!     tokio::spawn(Arc::clone(&node).run(cancel.clone()));
//!
//!     let metahash = gossip_node::core::ContentHash::from_hex(
//!         "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262",
//!     )?;
//!     if let DownloadOutcome::Completed(file) =
//!         node.download(metahash, "paper.pdf", "bob", &cancel).await?
//!     {
//!         println!("got {} chunks", file.stored_chunks());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `gossip_node::core` - hashes, metafiles, vector clocks, rumors
//! - `gossip_node::store` - collaborator traits and in-memory implementations
//! - `gossip_node::sync` - wire messages, transports and both protocols

pub mod error;
pub mod node;

pub use gossip_core as core;
pub use gossip_store as store;
pub use gossip_sync as sync;

pub use error::{NodeError, Result};
pub use node::{Node, NodeConfig};

pub use gossip_core::{ContentHash, RumorMessage, VectorClock};
pub use gossip_store::SharedFile;
pub use gossip_sync::{DownloadOutcome, TransferConfig};
