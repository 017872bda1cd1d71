//! Content addressing.
//!
//! Every chunk and every metafile is identified by the Blake3 digest of its
//! raw bytes. The same value is the lookup key in the file index and the
//! integrity check applied to incoming data replies.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Size of a content hash in bytes.
pub const HASH_SIZE: usize = 32;

/// A 32-byte content hash, computed as Blake3(bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; HASH_SIZE]);

impl ContentHash {
    /// Compute the content hash of the given data.
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Check that `data` hashes to this value.
    pub fn matches(&self, data: &[u8]) -> bool {
        blake3::hash(data) == blake3::Hash::from(self.0)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s)?;
        Self::try_from(bytes.as_slice())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for ContentHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; HASH_SIZE]> for ContentHash {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for ContentHash {
    type Error = CoreError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; HASH_SIZE] = slice
            .try_into()
            .map_err(|_| CoreError::InvalidHashLength(slice.len()))?;
        Ok(Self(arr))
    }
}
