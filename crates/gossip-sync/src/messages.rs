//! Wire message types.
//!
//! A datagram carries exactly one [`GossipPacket`] variant.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use gossip_core::clock::FIRST_ID;
use gossip_core::{ContentHash, RumorMessage, VectorClock};

/// Hop limit stamped on every request and reply a node originates.
pub const DEFAULT_HOP_LIMIT: u32 = 16;

/// Every message exchanged between gossip nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GossipPacket {
    /// A message of some origin's stream, pushed to a peer that lacks it.
    Rumor(RumorMessage),
    /// The sender's vector clock.
    Status(StatusPacket),
    /// Pull request for the bytes behind a content hash.
    DataRequest(DataRequest),
    /// Bytes behind a content hash (empty if the replier has none).
    DataReply(DataReply),
}

/// Pull request for the bytes behind `hash_value`, routed toward `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRequest {
    pub origin: String,
    pub destination: String,
    pub hop_limit: u32,
    pub hash_value: ContentHash,
}

/// Reply carrying the bytes behind `hash_value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataReply {
    pub origin: String,
    pub destination: String,
    pub hop_limit: u32,
    pub hash_value: ContentHash,
    pub data: Bytes,
}

impl DataReply {
    /// True if `data` hashes to `hash_value`.
    pub fn verify(&self) -> bool {
        self.hash_value.matches(&self.data)
    }
}

/// One entry of a status packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerStatus {
    /// Origin name.
    pub identifier: String,
    /// Next message id the sender expects from `identifier`.
    pub next_id: u32,
}

/// A vector clock on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPacket {
    pub want: Vec<PeerStatus>,
}

impl StatusPacket {
    /// The vector clock this status describes.
    ///
    /// Ids start at 1, so an entry below that means the same as no entry.
    pub fn to_clock(&self) -> VectorClock {
        self.want
            .iter()
            .map(|s| (s.identifier.clone(), s.next_id.max(FIRST_ID)))
            .collect()
    }
}

impl From<&VectorClock> for StatusPacket {
    fn from(clock: &VectorClock) -> Self {
        Self {
            want: clock
                .iter()
                .map(|(origin, next_id)| PeerStatus {
                    identifier: origin.to_string(),
                    next_id,
                })
                .collect(),
        }
    }
}

/// Point-to-point packets relayed hop by hop toward a named destination.
pub trait Routed: Into<GossipPacket> {
    fn destination(&self) -> &str;

    fn hop_limit(&self) -> u32;

    fn hop_limit_mut(&mut self) -> &mut u32;

    /// Spend one hop. Returns `false` if the packet must be dropped.
    fn consume_hop(&mut self) -> bool {
        let hops = self.hop_limit_mut();
        *hops = hops.saturating_sub(1);
        *hops != 0
    }
}

impl Routed for DataRequest {
    fn destination(&self) -> &str {
        &self.destination
    }

    fn hop_limit(&self) -> u32 {
        self.hop_limit
    }

    fn hop_limit_mut(&mut self) -> &mut u32 {
        &mut self.hop_limit
    }
}

impl Routed for DataReply {
    fn destination(&self) -> &str {
        &self.destination
    }

    fn hop_limit(&self) -> u32 {
        self.hop_limit
    }

    fn hop_limit_mut(&mut self) -> &mut u32 {
        &mut self.hop_limit
    }
}

impl From<DataRequest> for GossipPacket {
    fn from(request: DataRequest) -> Self {
        GossipPacket::DataRequest(request)
    }
}

impl From<DataReply> for GossipPacket {
    fn from(reply: DataReply) -> Self {
        GossipPacket::DataReply(reply)
    }
}
