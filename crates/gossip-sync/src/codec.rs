//! Datagram codec.
//!
//! Packets are CBOR-encoded. Encoding never retries; a packet that does not
//! fit in one UDP datagram is an encode failure.

use crate::error::{Result, SyncError};
use crate::messages::GossipPacket;

/// Largest UDP payload over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Serialize a packet into one datagram.
pub fn encode(packet: &GossipPacket) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(packet, &mut buf).map_err(|e| SyncError::EncodeFailed(e.to_string()))?;

    if buf.len() > MAX_DATAGRAM_SIZE {
        return Err(SyncError::EncodeFailed(format!(
            "packet of {} bytes exceeds datagram limit",
            buf.len()
        )));
    }
    Ok(buf)
}

/// Deserialize a packet from one datagram.
pub fn decode(bytes: &[u8]) -> Result<GossipPacket> {
    ciborium::from_reader(bytes).map_err(|e| SyncError::DecodeFailed(e.to_string()))
}
