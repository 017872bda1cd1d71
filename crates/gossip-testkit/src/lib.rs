//! # Gossip Testkit
//!
//! Testing utilities for the gossip node.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Clusters**: several nodes on one in-memory network, optionally lossy,
//!   with their receive loops running
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Clusters
//!
//! ```rust,no_run
//! use gossip_testkit::fixtures::TestCluster;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let cluster = TestCluster::line(&["alice", "bob", "carol"]).await?;
//!     let file = cluster.node("carol")?.share_bytes("notes.txt", &b"hello"[..])?;
//!     // alice reaches carol through bob
//!     cluster.shutdown().await
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use gossip_testkit::generators::vector_clock;
//!
//! proptest! {
//!     #[test]
//!     fn clock_covers_itself(clock in vector_clock()) {
//!         prop_assert!(clock.covers(&clock));
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{fast_config, init_tracing, random_bytes, TestCluster};
