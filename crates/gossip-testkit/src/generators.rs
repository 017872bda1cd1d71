//! Proptest generators for property-based testing.

use bytes::Bytes;
use proptest::prelude::*;

use gossip_core::{ContentHash, VectorClock};
use gossip_sync::DEFAULT_HOP_LIMIT;

/// Generate a short lowercase node name.
pub fn node_name() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

/// Generate a random ContentHash.
pub fn content_hash() -> impl Strategy<Value = ContentHash> {
    any::<[u8; 32]>().prop_map(ContentHash::from_bytes)
}

/// Generate a vector clock of up to five origins.
pub fn vector_clock() -> impl Strategy<Value = VectorClock> {
    prop::collection::btree_map(node_name(), 1u32..20, 0..5)
        .prop_map(|entries| entries.into_iter().collect())
}

/// Generate file contents of up to `max_len` bytes.
pub fn file_contents(max_len: usize) -> impl Strategy<Value = Bytes> {
    prop::collection::vec(any::<u8>(), 0..=max_len).prop_map(Bytes::from)
}

/// Generate a chunk size.
pub fn chunk_size() -> impl Strategy<Value = usize> {
    1usize..=64
}

/// Generate a hop limit no larger than the default.
pub fn hop_limit() -> impl Strategy<Value = u32> {
    0u32..=DEFAULT_HOP_LIMIT
}
