//! In-memory implementations of the collaborator traits.
//!
//! Thread-safe via `RwLock`. Guards are never held across an `.await`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use gossip_core::{split_chunks, ContentHash, Metafile, RumorMessage, VectorClock, CHUNK_SIZE};

use crate::error::{Result, StoreError};
use crate::shared::SharedFile;
use crate::traits::{ChunkProgress, FileIndex, MessageLog, Router};

fn read<T, R>(lock: &RwLock<T>, f: impl FnOnce(&T) -> R) -> R {
    f(&lock.read().unwrap_or_else(PoisonError::into_inner))
}

fn write<T, R>(lock: &RwLock<T>, f: impl FnOnce(&mut T) -> R) -> R {
    f(&mut lock.write().unwrap_or_else(PoisonError::into_inner))
}

// ─────────────────────────────────────────────────────────────────────────────
// Routing
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory routing table.
#[derive(Default)]
pub struct MemoryRouter {
    routes: RwLock<HashMap<String, SocketAddr>>,
}

impl MemoryRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all known routes.
    pub fn routes(&self) -> HashMap<String, SocketAddr> {
        read(&self.routes, |r| r.clone())
    }
}

#[async_trait]
impl Router for MemoryRouter {
    async fn get_target(&self, peer: &str) -> Option<SocketAddr> {
        read(&self.routes, |r| r.get(peer).copied())
    }

    async fn add_contact_if_absent(&self, peer: &str, addr: SocketAddr) {
        write(&self.routes, |r| {
            if !r.contains_key(peer) {
                tracing::debug!(peer, %addr, "new route");
                r.insert(peer.to_string(), addr);
            }
        });
    }

    async fn set_contact(&self, peer: &str, addr: SocketAddr) {
        write(&self.routes, |r| {
            r.insert(peer.to_string(), addr);
        });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Files
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory content-addressed file index.
///
/// Reconstructed downloads are written to the download directory, if one is
/// configured.
pub struct MemoryFileIndex {
    inner: RwLock<FileIndexInner>,
    chunk_size: usize,
    download_dir: Option<PathBuf>,
}

#[derive(Default)]
struct FileIndexInner {
    /// Files by local name.
    files: HashMap<String, SharedFile>,
    /// Servable chunks and metafiles by content hash.
    blobs: HashMap<ContentHash, Bytes>,
}

impl MemoryFileIndex {
    /// Create an empty index with the default chunk size.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(FileIndexInner::default()),
            chunk_size: CHUNK_SIZE,
            download_dir: None,
        }
    }

    /// Split local files into chunks of `chunk_size` bytes.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Write reconstructed downloads into `dir`.
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    /// Share `data` under `filename`.
    pub fn index_bytes(&self, filename: &str, data: Bytes) -> Result<SharedFile> {
        let chunks = split_chunks(&data, self.chunk_size);
        let hashes: Vec<ContentHash> = chunks.iter().map(|c| ContentHash::of(c)).collect();
        let metafile = Metafile::from_hashes(&hashes);

        write(&self.inner, |inner| {
            if inner.files.contains_key(filename) {
                return Err(StoreError::FileExists(filename.to_string()));
            }

            inner
                .blobs
                .insert(metafile.metahash(), metafile.as_bytes().clone());
            for (hash, chunk) in hashes.iter().zip(&chunks) {
                inner.blobs.insert(*hash, chunk.clone());
            }

            let file = SharedFile::local(filename.to_string(), metafile, chunks);
            inner.files.insert(filename.to_string(), file.clone());

            tracing::info!(
                filename,
                metahash = %file.metahash().to_hex(),
                chunks = hashes.len(),
                "indexed file"
            );
            Ok(file)
        })
    }

    /// Read the file at `path` and share it under its file name.
    pub async fn index_path(&self, path: impl AsRef<Path>) -> Result<SharedFile> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::InvalidData(format!("no file name in {}", path.display())))?;
        let data = tokio::fs::read(path).await?;
        self.index_bytes(filename, Bytes::from(data))
    }

    /// Names of all files in the index.
    pub fn filenames(&self) -> Vec<String> {
        read(&self.inner, |inner| inner.files.keys().cloned().collect())
    }

    fn store_blob(&self, hash: ContentHash, data: Bytes) {
        write(&self.inner, |inner| {
            inner.blobs.insert(hash, data);
        });
    }

    async fn finish(&self, file: &SharedFile) -> Result<ChunkProgress> {
        tracing::info!(filename = file.filename(), "reconstructed file");

        if let Some(dir) = &self.download_dir {
            let data = file.assemble().ok_or_else(|| {
                StoreError::InvalidData(format!("{} is missing chunks", file.filename()))
            })?;
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(dir.join(file.filename()), &data).await?;
        }

        file.mark_reconstructed();
        Ok(ChunkProgress::Complete)
    }
}

impl Default for MemoryFileIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileIndex for MemoryFileIndex {
    async fn get_data_from_hash(&self, hash: &ContentHash) -> Bytes {
        read(&self.inner, |inner| inner.blobs.get(hash).cloned()).unwrap_or_default()
    }

    async fn handle_data_reply(
        &self,
        file: &SharedFile,
        chunk_index: u64,
        data: Bytes,
    ) -> Result<ChunkProgress> {
        let source = file
            .source()
            .ok_or_else(|| {
                StoreError::InvalidData(format!("{} is not a remote file", file.filename()))
            })?
            .to_string();

        if chunk_index == 0 {
            let metafile = Metafile::from_bytes(data.clone())?;
            let chunk_count = metafile.chunk_count();
            self.store_blob(file.metahash(), data);
            file.install_metafile(metafile);

            if chunk_count == 0 {
                return self.finish(file).await;
            }
            return Ok(ChunkProgress::Next { index: 1, source });
        }

        let hash = file.chunk_hash(chunk_index).ok_or_else(|| {
            StoreError::InvalidData(format!(
                "chunk {} of {} is not in its metafile",
                chunk_index,
                file.filename()
            ))
        })?;
        self.store_blob(hash, data.clone());

        // Repeated content: every chunk with this hash is now known.
        let Some(metafile) = file.metafile() else {
            return Err(StoreError::InvalidData(format!(
                "{} has no metafile",
                file.filename()
            )));
        };
        for (index, chunk_hash) in (1..).zip(metafile.hashes()) {
            if chunk_hash == hash {
                file.store_chunk(index, data.clone());
            }
        }

        match (1..=metafile.chunk_count()).find(|&index| file.chunk(index).is_none()) {
            Some(index) => Ok(ChunkProgress::Next { index, source }),
            None => self.finish(file).await,
        }
    }

    async fn add_mono_source_file(
        &self,
        filename: &str,
        source: &str,
        metahash: ContentHash,
    ) -> Option<SharedFile> {
        write(&self.inner, |inner| {
            if inner.files.contains_key(filename) {
                return None;
            }
            let file = SharedFile::remote(filename.to_string(), source.to_string(), metahash);
            inner.files.insert(filename.to_string(), file.clone());
            Some(file)
        })
    }

    async fn shared_file(&self, filename: &str) -> Option<SharedFile> {
        read(&self.inner, |inner| inner.files.get(filename).cloned())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory message log.
///
/// Each origin's stream is kept contiguous: message `id` lives at index
/// `id - 1`, so the next expected id is always `len + 1`.
#[derive(Default)]
pub struct MemoryMessageLog {
    streams: RwLock<HashMap<String, Vec<RumorMessage>>>,
}

impl MemoryMessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Message `id` of `origin`, if held.
    pub fn get(&self, origin: &str, id: u32) -> Option<RumorMessage> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        read(&self.streams, |s| s.get(origin)?.get(index).cloned())
    }

    fn clock(&self) -> VectorClock {
        read(&self.streams, |s| {
            s.iter()
                .map(|(origin, msgs)| (origin.clone(), msgs.len() as u32 + 1))
                .collect()
        })
    }
}

#[async_trait]
impl MessageLog for MemoryMessageLog {
    async fn get_unknown_message_target(&self, peer: &VectorClock) -> Option<RumorMessage> {
        let (origin, id) = self.clock().missing_from(peer)?;
        self.get(&origin, id)
    }

    async fn is_local_status_complete(&self, peer: &VectorClock) -> bool {
        self.clock().covers(peer)
    }

    async fn get_vector_clock(&self) -> VectorClock {
        self.clock()
    }

    async fn insert(&self, rumor: RumorMessage) -> bool {
        write(&self.streams, |s| {
            let expected = s.get(&rumor.origin).map_or(0, Vec::len) + 1;
            if rumor.id as usize != expected {
                return false;
            }
            s.entry(rumor.origin.clone()).or_default().push(rumor);
            true
        })
    }

    async fn publish(&self, origin: &str, text: &str) -> RumorMessage {
        write(&self.streams, |s| {
            let stream = s.entry(origin.to_string()).or_default();
            let rumor = RumorMessage::new(origin, stream.len() as u32 + 1, text);
            stream.push(rumor.clone());
            rumor
        })
    }
}
