//! Shared files: the file index's unit of storage.
//!
//! A `SharedFile` is a cheap-to-clone handle. Clones observe the same
//! metafile and chunk map, so a pending request that captured the handle
//! before the metafile arrived sees it once the index installs it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use bytes::{Bytes, BytesMut};
use gossip_core::{ContentHash, Metafile};
use tokio::sync::watch;

/// A file known to the local node, complete or in progress.
#[derive(Clone)]
pub struct SharedFile {
    inner: Arc<SharedFileInner>,
}

struct SharedFileInner {
    filename: String,
    metahash: ContentHash,
    /// Peer the file is downloaded from; `None` for locally indexed files.
    source: Option<String>,
    contents: RwLock<FileContents>,
    /// Flips to `true` once the file is fully reconstructed.
    reconstructed: watch::Sender<bool>,
}

#[derive(Default)]
struct FileContents {
    /// `None` until the metafile of a remote file is retrieved.
    metafile: Option<Metafile>,
    chunks: BTreeMap<u64, Bytes>,
}

impl SharedFile {
    /// A locally indexed file with all of its chunks.
    pub(crate) fn local(filename: String, metafile: Metafile, chunks: Vec<Bytes>) -> Self {
        let metahash = metafile.metahash();
        let chunks = (1..).zip(chunks).collect();
        let file = Self::build(
            filename,
            metahash,
            None,
            FileContents {
                metafile: Some(metafile),
                chunks,
            },
        );
        file.mark_reconstructed();
        file
    }

    /// A file to be downloaded from `source`, known only by its metahash.
    pub(crate) fn remote(filename: String, source: String, metahash: ContentHash) -> Self {
        Self::build(filename, metahash, Some(source), FileContents::default())
    }

    fn build(
        filename: String,
        metahash: ContentHash,
        source: Option<String>,
        contents: FileContents,
    ) -> Self {
        Self {
            inner: Arc::new(SharedFileInner {
                filename,
                metahash,
                source,
                contents: RwLock::new(contents),
                reconstructed: watch::channel(false).0,
            }),
        }
    }

    pub fn filename(&self) -> &str {
        &self.inner.filename
    }

    pub fn metahash(&self) -> ContentHash {
        self.inner.metahash
    }

    /// Peer this file is being downloaded from, if remotely sourced.
    pub fn source(&self) -> Option<&str> {
        self.inner.source.as_deref()
    }

    /// The metafile, once known.
    pub fn metafile(&self) -> Option<Metafile> {
        self.read(|c| c.metafile.clone())
    }

    /// Hash of chunk `index` (1-based), if the metafile is known and covers it.
    pub fn chunk_hash(&self, index: u64) -> Option<ContentHash> {
        self.read(|c| c.metafile.as_ref().and_then(|m| m.chunk_hash(index)))
    }

    /// Stored bytes of chunk `index`.
    pub fn chunk(&self, index: u64) -> Option<Bytes> {
        self.read(|c| c.chunks.get(&index).cloned())
    }

    /// Number of chunks stored so far.
    pub fn stored_chunks(&self) -> usize {
        self.read(|c| c.chunks.len())
    }

    /// True once the metafile is known and every chunk it lists is stored.
    pub fn is_complete(&self) -> bool {
        self.read(|c| match &c.metafile {
            Some(meta) => c.chunks.len() as u64 == meta.chunk_count(),
            None => false,
        })
    }

    /// Concatenate the chunks into the file contents, if complete.
    pub fn assemble(&self) -> Option<Bytes> {
        self.read(|c| {
            let meta = c.metafile.as_ref()?;
            let mut buf = BytesMut::new();
            for index in 1..=meta.chunk_count() {
                buf.extend_from_slice(c.chunks.get(&index)?);
            }
            Some(buf.freeze())
        })
    }

    /// Wait until the file is fully reconstructed.
    ///
    /// Returns immediately for local files and finished downloads.
    pub async fn wait_reconstructed(&self) {
        let mut rx = self.inner.reconstructed.subscribe();
        loop {
            let done = *rx.borrow_and_update();
            if done || rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub(crate) fn mark_reconstructed(&self) {
        self.inner.reconstructed.send_replace(true);
    }

    pub(crate) fn install_metafile(&self, metafile: Metafile) {
        self.write(|c| c.metafile = Some(metafile));
    }

    pub(crate) fn store_chunk(&self, index: u64, data: Bytes) {
        self.write(|c| {
            c.chunks.insert(index, data);
        });
    }

    fn read<R>(&self, f: impl FnOnce(&FileContents) -> R) -> R {
        let guard = self
            .inner
            .contents
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<R>(&self, f: impl FnOnce(&mut FileContents) -> R) -> R {
        let mut guard = self
            .inner
            .contents
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl fmt::Debug for SharedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedFile")
            .field("filename", &self.inner.filename)
            .field("metahash", &self.inner.metahash)
            .field("source", &self.inner.source)
            .field("stored_chunks", &self.stored_chunks())
            .finish()
    }
}
