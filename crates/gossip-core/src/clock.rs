//! Vector clocks and the anti-entropy decision.
//!
//! A vector clock maps each origin to the next sequence number the holder
//! expects from that origin ("I have everything with id < this value").
//! Sequence numbers start at 1, so an origin that is absent from a clock is
//! equivalent to an entry of 1.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// First sequence number of every origin's stream.
pub const FIRST_ID: u32 = 1;

/// Per-origin "next expected id" map.
///
/// Backed by a `BTreeMap` so iteration is ordered by origin name, which makes
/// rumor selection deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorClock(BTreeMap<String, u32>);

impl VectorClock {
    /// Create an empty clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id expected from `origin`.
    pub fn next_expected(&self, origin: &str) -> u32 {
        self.0.get(origin).copied().unwrap_or(FIRST_ID)
    }

    /// Set the next expected id for `origin`.
    pub fn set(&mut self, origin: impl Into<String>, next_id: u32) {
        self.0.insert(origin.into(), next_id);
    }

    /// Builder form of [`VectorClock::set`].
    pub fn with(mut self, origin: impl Into<String>, next_id: u32) -> Self {
        self.set(origin, next_id);
        self
    }

    /// Iterate over `(origin, next_id)` in origin order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(o, n)| (o.as_str(), *n))
    }

    /// Number of origins in the clock.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Find a message this clock's holder has and `peer` lacks.
    ///
    /// Returns `(origin, id)` where `id` is the peer's next expected id for the
    /// lowest origin name on which the local clock is ahead.
    pub fn missing_from(&self, peer: &VectorClock) -> Option<(String, u32)> {
        self.0.iter().find_map(|(origin, &local_next)| {
            let peer_next = peer.next_expected(origin);
            (local_next > peer_next).then(|| (origin.clone(), peer_next))
        })
    }

    /// True if, for every origin `peer` reports, this clock is at least as far.
    pub fn covers(&self, peer: &VectorClock) -> bool {
        peer.iter()
            .all(|(origin, peer_next)| self.next_expected(origin) >= peer_next)
    }
}

impl FromIterator<(String, u32)> for VectorClock {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Outcome of comparing the local clock with a peer's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The peer lacks message `seq` of `origin`; push it.
    Push { origin: String, seq: u32 },
    /// Neither side has anything the other lacks.
    InSync,
    /// The peer has messages the local node lacks; send our clock back.
    Pull,
}

/// Decide the anti-entropy action for a received status.
pub fn decide(local: &VectorClock, peer: &VectorClock) -> Decision {
    if let Some((origin, seq)) = local.missing_from(peer) {
        Decision::Push { origin, seq }
    } else if local.covers(peer) {
        Decision::InSync
    } else {
        Decision::Pull
    }
}
