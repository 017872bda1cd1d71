//! Metafiles: the ordered chunk-hash list of a shared file.
//!
//! A metafile is the concatenation of the content hashes of a file's chunks,
//! in chunk order. Chunk indices are 1-based; index 0 never addresses a chunk
//! because it stands for the metafile itself.
//!
//! ```text
//! metafile: | h(chunk 1) | h(chunk 2) | ... | h(chunk N) |
//!           0            32           64     (N-1)*32     N*32
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::hash::{ContentHash, HASH_SIZE};

/// Size of a data chunk when a local file is indexed.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// An ordered sequence of chunk hashes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metafile(Bytes);

impl Metafile {
    /// Parse a metafile from raw bytes.
    ///
    /// Fails unless the length is a multiple of [`HASH_SIZE`].
    pub fn from_bytes(bytes: Bytes) -> Result<Self> {
        if bytes.len() % HASH_SIZE != 0 {
            return Err(CoreError::InvalidMetafileLength(bytes.len()));
        }
        Ok(Self(bytes))
    }

    /// Build a metafile from chunk hashes in order.
    pub fn from_hashes<'a>(hashes: impl IntoIterator<Item = &'a ContentHash>) -> Self {
        let mut buf = Vec::new();
        for hash in hashes {
            buf.extend_from_slice(hash.as_bytes());
        }
        Self(Bytes::from(buf))
    }

    /// The metahash: content hash of the metafile bytes.
    pub fn metahash(&self) -> ContentHash {
        ContentHash::of(&self.0)
    }

    /// Number of chunks the metafile describes.
    pub fn chunk_count(&self) -> u64 {
        (self.0.len() / HASH_SIZE) as u64
    }

    /// Hash of chunk `index` (1-based).
    ///
    /// Returns `None` for index 0 and for indices past the last chunk.
    pub fn chunk_hash(&self, index: u64) -> Option<ContentHash> {
        if index == 0 || index > self.chunk_count() {
            return None;
        }
        let start = (index as usize - 1) * HASH_SIZE;
        ContentHash::try_from(&self.0[start..start + HASH_SIZE]).ok()
    }

    /// Iterate over chunk hashes in order.
    pub fn hashes(&self) -> impl Iterator<Item = ContentHash> + '_ {
        self.0
            .chunks_exact(HASH_SIZE)
            .filter_map(|c| ContentHash::try_from(c).ok())
    }

    /// Raw metafile bytes.
    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    /// True if the metafile describes no chunks (empty file, or not yet fetched).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Split file contents into chunks of at most `chunk_size` bytes.
///
/// An empty input yields no chunks.
pub fn split_chunks(data: &Bytes, chunk_size: usize) -> Vec<Bytes> {
    let chunk_size = chunk_size.max(1);
    (0..data.len())
        .step_by(chunk_size)
        .map(|start| data.slice(start..(start + chunk_size).min(data.len())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hashes(n: u8) -> Vec<ContentHash> {
        (1..=n).map(|i| ContentHash::of(&[i])).collect()
    }

    #[test]
    fn test_rejects_partial_hash() {
        let err = Metafile::from_bytes(Bytes::from(vec![0u8; 33])).unwrap_err();
        assert!(matches!(err, CoreError::InvalidMetafileLength(33)));
    }

    #[test]
    fn test_index_zero_is_never_a_chunk() {
        let meta = Metafile::from_hashes(&hashes(3));
        assert_eq!(meta.chunk_hash(0), None);
        assert_eq!(meta.chunk_hash(4), None);
    }

    #[test]
    fn test_split_chunks_last_is_short() {
        let data = Bytes::from(vec![7u8; 20]);
        let chunks = split_chunks(&data, 8);
        let lens: Vec<_> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(lens, vec![8, 8, 4]);
    }

    #[test]
    fn test_split_empty_has_no_chunks() {
        assert!(split_chunks(&Bytes::new(), CHUNK_SIZE).is_empty());
    }

    proptest! {
        #[test]
        fn chunk_index_selects_its_slice(n in 1u8..40, pick in 1u8..40) {
            let list = hashes(n);
            let meta = Metafile::from_hashes(&list);
            prop_assert_eq!(meta.chunk_count(), n as u64);

            let i = (pick % n) as u64 + 1;
            let start = (i as usize - 1) * HASH_SIZE;
            let expected = &meta.as_bytes()[start..start + HASH_SIZE];
            let got = meta.chunk_hash(i).unwrap();
            prop_assert_eq!(got.as_bytes().as_slice(), expected);
            prop_assert_eq!(got, list[i as usize - 1]);
        }

        #[test]
        fn split_chunks_preserves_content(data in proptest::collection::vec(any::<u8>(), 0..2000), size in 1usize..300) {
            let bytes = Bytes::from(data.clone());
            let joined: Vec<u8> = split_chunks(&bytes, size).concat();
            prop_assert_eq!(joined, data);
        }
    }
}
