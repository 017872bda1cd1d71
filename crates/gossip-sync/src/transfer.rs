//! Chunked, hash-verified file transfer.
//!
//! A download fetches the metafile by its hash, then each chunk in order.
//! Every request goes through the [`TimeoutTracker`], which resends it until
//! a verified reply resolves it. Requests and replies not addressed to this
//! node are relayed toward their destination while hop budget remains.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use gossip_core::ContentHash;
use gossip_store::{ChunkProgress, FileIndex, Router, SharedFile};

use crate::error::{Result, SyncError};
use crate::messages::{DataReply, DataRequest, GossipPacket, Routed, DEFAULT_HOP_LIMIT};
use crate::timeouts::{PendingRequest, TimeoutTracker};
use crate::transport::{send_packet, Transport};

/// Configuration for transfer behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Hop limit stamped on originated requests and replies.
    pub hop_limit: u32,
    /// Delay before an unanswered request is resent.
    pub resend_interval: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            hop_limit: DEFAULT_HOP_LIMIT,
            resend_interval: Duration::from_secs(5),
        }
    }
}

/// Result of a timed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A verified reply resolved the request.
    Resolved,
    /// Nothing was sent (no route, or nothing to ask for).
    Skipped,
}

/// Result of a whole-file download.
#[derive(Debug, Clone)]
pub enum DownloadOutcome {
    /// Every chunk arrived and verified.
    Completed(SharedFile),
    /// Nothing was started (no route, or the file name is taken).
    Skipped,
}

/// What an incoming request or reply led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// A request for us was answered.
    Served,
    /// Forwarded toward its destination.
    Relayed,
    /// Hop limit exhausted or no route; silently dropped.
    Dropped,
    /// Reply failed its integrity check or could not be stored.
    Rejected,
    /// Verified reply with no pending request (stale or duplicate).
    Ignored,
    /// Reply stored and the request for the next chunk started.
    Progressed,
    /// Reply stored and the file is complete.
    Reconstructed,
}

/// The chunked transfer protocol of one node.
pub struct DataTransfer {
    /// This node's name.
    name: String,
    transport: Arc<dyn Transport>,
    router: Arc<dyn Router>,
    files: Arc<dyn FileIndex>,
    tracker: TimeoutTracker,
    config: TransferConfig,
}

impl DataTransfer {
    /// Create the transfer protocol for the node called `name`.
    pub fn new(
        name: impl Into<String>,
        transport: Arc<dyn Transport>,
        router: Arc<dyn Router>,
        files: Arc<dyn FileIndex>,
        config: TransferConfig,
    ) -> Self {
        Self {
            name: name.into(),
            transport,
            router,
            files,
            tracker: TimeoutTracker::new(config.resend_interval),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tracker(&self) -> &TimeoutTracker {
        &self.tracker
    }

    /// Download the file behind `metahash` from `remote_peer`.
    ///
    /// Resolves once the last chunk has been verified and stored. Cancelling
    /// `cancel` also stops every chunk request this download has started.
    pub async fn download(
        &self,
        metahash: ContentHash,
        local_filename: &str,
        remote_peer: &str,
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome> {
        let Some(file) = self
            .request_metafile(metahash, local_filename, remote_peer, cancel)
            .await?
        else {
            return Ok(DownloadOutcome::Skipped);
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(SyncError::Cancelled),
            _ = file.wait_reconstructed() => Ok(DownloadOutcome::Completed(file.clone())),
        }
    }

    /// Register a file sourced from `remote_peer` and fetch its metafile.
    ///
    /// Returns `None` without sending anything if `remote_peer` has no route
    /// or `local_filename` is already taken.
    pub async fn request_metafile(
        &self,
        metahash: ContentHash,
        local_filename: &str,
        remote_peer: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<SharedFile>> {
        let Some(addr) = self.router.get_target(remote_peer).await else {
            return Ok(None);
        };
        let Some(file) = self
            .files
            .add_mono_source_file(local_filename, remote_peer, metahash)
            .await
        else {
            tracing::debug!(local_filename, "file name already taken");
            return Ok(None);
        };

        tracing::info!(
            filename = local_filename,
            peer = remote_peer,
            "downloading metafile"
        );
        self.timed_request(metahash, remote_peer, addr, &file, 0, cancel)
            .await?;
        Ok(Some(file))
    }

    /// Fetch chunk `chunk_index` (1-based) of `file` from `remote_peer`.
    pub async fn request_chunk(
        &self,
        file: &SharedFile,
        chunk_index: u64,
        remote_peer: &str,
        cancel: &CancellationToken,
    ) -> Result<RequestOutcome> {
        let Some(addr) = self.router.get_target(remote_peer).await else {
            return Ok(RequestOutcome::Skipped);
        };
        let Some(hash) = file.chunk_hash(chunk_index) else {
            tracing::warn!(
                filename = file.filename(),
                chunk = chunk_index,
                "chunk index not covered by metafile"
            );
            return Ok(RequestOutcome::Skipped);
        };

        tracing::info!(
            filename = file.filename(),
            chunk = chunk_index,
            peer = remote_peer,
            "downloading chunk"
        );
        self.timed_request(hash, remote_peer, addr, file, chunk_index, cancel)
            .await
    }

    async fn timed_request(
        &self,
        hash: ContentHash,
        remote_peer: &str,
        addr: SocketAddr,
        file: &SharedFile,
        chunk_index: u64,
        cancel: &CancellationToken,
    ) -> Result<RequestOutcome> {
        let request = DataRequest {
            origin: self.name.clone(),
            destination: remote_peer.to_string(),
            hop_limit: self.config.hop_limit,
            hash_value: hash,
        };

        let registration =
            self.tracker
                .register(hash, remote_peer, file.clone(), chunk_index, cancel.clone());
        registration
            .send(self.transport.as_ref(), &request, addr)
            .await?;
        Ok(RequestOutcome::Resolved)
    }

    /// Answer a request addressed to us, or relay it.
    pub async fn handle_incoming_request(
        &self,
        request: DataRequest,
        sender: SocketAddr,
    ) -> Result<Handled> {
        if request.destination != self.name {
            return self.relay(request).await;
        }

        self.router
            .add_contact_if_absent(&request.origin, sender)
            .await;

        let data = self.files.get_data_from_hash(&request.hash_value).await;
        let reply = DataReply {
            origin: self.name.clone(),
            destination: request.origin,
            hop_limit: self.config.hop_limit,
            hash_value: request.hash_value,
            data,
        };

        match self.router.get_target(&reply.destination).await {
            Some(addr) => {
                tracing::debug!(
                    hash = %reply.hash_value,
                    to = %reply.destination,
                    found = !reply.data.is_empty(),
                    "serving data request"
                );
                send_packet(self.transport.as_ref(), &reply.into(), addr).await?;
                Ok(Handled::Served)
            }
            None => Ok(Handled::Dropped),
        }
    }

    /// Verify and consume a reply addressed to us, or relay it.
    ///
    /// A verified reply is handed to the file index once for every pending
    /// request it resolves. When another chunk is due, its request runs on a
    /// task of its own under the token of the download it belongs to, and
    /// also stops when `shutdown` fires.
    pub async fn handle_incoming_reply(
        self: &Arc<Self>,
        reply: DataReply,
        sender: SocketAddr,
        shutdown: &CancellationToken,
    ) -> Result<Handled> {
        if reply.destination != self.name {
            return self.relay(reply).await;
        }

        if !reply.verify() {
            tracing::warn!(
                hash = %reply.hash_value,
                actual = %ContentHash::of(&reply.data),
                origin = %reply.origin,
                %sender,
                "data does not match its hash, discarding"
            );
            return Ok(Handled::Rejected);
        }

        let resolved = self.tracker.mark_received(&reply.hash_value, &reply.origin);
        if resolved.is_empty() {
            tracing::debug!(hash = %reply.hash_value, "no pending request for reply");
            return Ok(Handled::Ignored);
        }

        let mut handled = Handled::Rejected;
        for pending in resolved {
            let progress = match self
                .files
                .handle_data_reply(&pending.file, pending.chunk_index, reply.data.clone())
                .await
            {
                Ok(progress) => progress,
                Err(e) => {
                    tracing::warn!(
                        filename = pending.file.filename(),
                        chunk = pending.chunk_index,
                        "could not store reply: {}",
                        e
                    );
                    continue;
                }
            };

            match progress {
                ChunkProgress::Next { index, source } => {
                    self.spawn_chunk_request(pending, index, source, shutdown.clone());
                    if handled == Handled::Rejected {
                        handled = Handled::Progressed;
                    }
                }
                ChunkProgress::Complete => {
                    tracing::info!(filename = pending.file.filename(), "RECONSTRUCTED file");
                    handled = Handled::Reconstructed;
                }
            }
        }
        Ok(handled)
    }

    fn spawn_chunk_request(
        self: &Arc<Self>,
        pending: PendingRequest,
        index: u64,
        source: String,
        shutdown: CancellationToken,
    ) {
        let transfer = Arc::clone(self);
        tokio::spawn(async move {
            let request = transfer.request_chunk(&pending.file, index, &source, &pending.cancel);
            let result = tokio::select! {
                _ = shutdown.cancelled() => Err(SyncError::Cancelled),
                result = request => result,
            };
            match result {
                Ok(_) => {}
                Err(SyncError::Cancelled) => {
                    tracing::debug!(
                        filename = pending.file.filename(),
                        chunk = index,
                        "chunk request cancelled"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        filename = pending.file.filename(),
                        chunk = index,
                        "chunk request failed: {}",
                        e
                    );
                }
            }
        });
    }

    /// Spend one hop and forward `packet` toward its destination.
    async fn relay<P: Routed>(&self, mut packet: P) -> Result<Handled> {
        if !packet.consume_hop() {
            tracing::debug!(to = packet.destination(), "hop limit exhausted, dropping");
            return Ok(Handled::Dropped);
        }

        let Some(addr) = self.router.get_target(packet.destination()).await else {
            return Ok(Handled::Dropped);
        };

        let packet: GossipPacket = packet.into();
        send_packet(self.transport.as_ref(), &packet, addr).await?;
        Ok(Handled::Relayed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::transport::memory::{MemoryNetwork, MemoryTransport};
    use bytes::Bytes;
    use gossip_store::{MemoryFileIndex, MemoryRouter};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    struct Harness {
        transfer: Arc<DataTransfer>,
        router: Arc<MemoryRouter>,
        files: Arc<MemoryFileIndex>,
        network: Arc<MemoryNetwork>,
    }

    async fn harness(name: &str, port: u16) -> Harness {
        let network = MemoryNetwork::new();
        let transport = Arc::new(network.create_transport(addr(port)).await);
        let router = Arc::new(MemoryRouter::new());
        let files = Arc::new(MemoryFileIndex::new().with_chunk_size(4));
        let transfer = Arc::new(DataTransfer::new(
            name,
            transport,
            router.clone(),
            files.clone(),
            TransferConfig::default(),
        ));
        Harness {
            transfer,
            router,
            files,
            network,
        }
    }

    async fn recv_packet(transport: &MemoryTransport) -> GossipPacket {
        let (bytes, _) = transport.recv_from().await.unwrap();
        codec::decode(&bytes).unwrap()
    }

    async fn recv_request(transport: &MemoryTransport) -> DataRequest {
        match recv_packet(transport).await {
            GossipPacket::DataRequest(request) => request,
            other => panic!("expected DataRequest, got {:?}", other),
        }
    }

    fn reply_from_bob(hash_value: ContentHash, data: Bytes) -> DataReply {
        DataReply {
            origin: "bob".into(),
            destination: "alice".into(),
            hop_limit: DEFAULT_HOP_LIMIT,
            hash_value,
            data,
        }
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("condition not reached");
    }

    fn source_file(data: &'static [u8]) -> SharedFile {
        MemoryFileIndex::new()
            .with_chunk_size(4)
            .index_bytes("src", Bytes::from_static(data))
            .unwrap()
    }

    #[tokio::test]
    async fn test_relay_decrements_hop_limit() {
        let h = harness("bob", 2).await;
        let carol = h.network.create_transport(addr(3)).await;
        h.router.set_contact("carol", addr(3)).await;

        let request = DataRequest {
            origin: "alice".into(),
            destination: "carol".into(),
            hop_limit: 5,
            hash_value: ContentHash::of(b"x"),
        };
        let handled = h
            .transfer
            .handle_incoming_request(request.clone(), addr(1))
            .await
            .unwrap();
        assert_eq!(handled, Handled::Relayed);

        match recv_packet(&carol).await {
            GossipPacket::DataRequest(forwarded) => {
                assert_eq!(forwarded.hop_limit, 4);
                assert_eq!(forwarded.origin, request.origin);
                assert_eq!(forwarded.hash_value, request.hash_value);
            }
            other => panic!("expected DataRequest, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_last_hop_is_dropped_silently() {
        let h = harness("bob", 2).await;
        let _carol = h.network.create_transport(addr(3)).await;
        h.router.set_contact("carol", addr(3)).await;

        let reply = DataReply {
            origin: "alice".into(),
            destination: "carol".into(),
            hop_limit: 1,
            hash_value: ContentHash::of(b""),
            data: Bytes::new(),
        };
        let cancel = CancellationToken::new();
        let handled = h
            .transfer
            .handle_incoming_reply(reply, addr(1), &cancel)
            .await
            .unwrap();

        assert_eq!(handled, Handled::Dropped);
        assert!(h.network.history().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_request_is_served_and_learns_route() {
        let h = harness("bob", 2).await;
        let alice = h.network.create_transport(addr(1)).await;
        let file = h
            .files
            .index_bytes("a.txt", Bytes::from_static(b"abcdefgh"))
            .unwrap();
        let chunk2 = file.chunk_hash(2).unwrap();

        let request = DataRequest {
            origin: "alice".into(),
            destination: "bob".into(),
            hop_limit: 3,
            hash_value: chunk2,
        };
        let handled = h
            .transfer
            .handle_incoming_request(request, addr(1))
            .await
            .unwrap();
        assert_eq!(handled, Handled::Served);
        assert_eq!(h.router.get_target("alice").await, Some(addr(1)));

        match recv_packet(&alice).await {
            GossipPacket::DataReply(reply) => {
                assert_eq!(reply.origin, "bob");
                assert_eq!(reply.destination, "alice");
                assert_eq!(reply.hop_limit, DEFAULT_HOP_LIMIT);
                assert_eq!(reply.data, Bytes::from_static(b"efgh"));
                assert!(reply.verify());
            }
            other => panic!("expected DataReply, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_hash_is_answered_with_empty_data() {
        let h = harness("bob", 2).await;
        let alice = h.network.create_transport(addr(1)).await;

        let request = DataRequest {
            origin: "alice".into(),
            destination: "bob".into(),
            hop_limit: 3,
            hash_value: ContentHash::of(b"nothing here"),
        };
        h.transfer
            .handle_incoming_request(request, addr(1))
            .await
            .unwrap();

        match recv_packet(&alice).await {
            GossipPacket::DataReply(reply) => assert!(reply.data.is_empty()),
            other => panic!("expected DataReply, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_request_without_route_is_skipped() {
        let h = harness("alice", 1).await;
        let cancel = CancellationToken::new();

        let outcome = h
            .transfer
            .request_metafile(ContentHash::of(b"m"), "f", "nobody", &cancel)
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert!(h.files.filenames().is_empty());
        assert!(h.network.history().is_empty());
    }

    #[tokio::test]
    async fn test_name_collision_is_skipped() {
        let h = harness("alice", 1).await;
        let _bob = h.network.create_transport(addr(2)).await;
        h.router.set_contact("bob", addr(2)).await;
        h.files
            .index_bytes("taken", Bytes::from_static(b"mine"))
            .unwrap();

        let cancel = CancellationToken::new();
        let outcome = h
            .transfer
            .download(ContentHash::of(b"m"), "taken", "bob", &cancel)
            .await
            .unwrap();
        assert!(matches!(outcome, DownloadOutcome::Skipped));
        assert!(h.network.history().is_empty());
    }

    #[tokio::test]
    async fn test_request_chunk_addresses_metafile_slice() {
        let h = harness("alice", 1).await;
        let bob = h.network.create_transport(addr(2)).await;
        h.router.set_contact("bob", addr(2)).await;

        let source = MemoryFileIndex::new().with_chunk_size(4);
        let original = source
            .index_bytes("src", Bytes::from_static(b"0123456789ab"))
            .unwrap();
        let meta = original.metafile().unwrap();

        let file = h
            .files
            .add_mono_source_file("copy", "bob", original.metahash())
            .await
            .unwrap();
        h.files
            .handle_data_reply(&file, 0, meta.as_bytes().clone())
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let transfer = h.transfer.clone();
        let task_cancel = cancel.clone();
        let task_file = file.clone();
        let task = tokio::spawn(async move {
            transfer
                .request_chunk(&task_file, 2, "bob", &task_cancel)
                .await
        });

        match recv_packet(&bob).await {
            GossipPacket::DataRequest(request) => {
                assert_eq!(request.hash_value, meta.chunk_hash(2).unwrap());
                assert_eq!(&request.hash_value.as_bytes()[..], &meta.as_bytes()[32..64]);
                assert_eq!(request.destination, "bob");
                assert_eq!(request.hop_limit, DEFAULT_HOP_LIMIT);
            }
            other => panic!("expected DataRequest, got {:?}", other),
        }
        assert!(h.transfer.tracker().is_pending(&meta.chunk_hash(2).unwrap()));

        cancel.cancel();
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, SyncError::Cancelled));
        assert_eq!(h.transfer.tracker().pending_count(), 0);

        // Index 0 is the metafile, never a chunk.
        let outcome = h
            .transfer
            .request_chunk(&file, 0, "bob", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, RequestOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_corrupt_reply_leaves_request_pending() {
        let h = harness("alice", 1).await;
        let bob = h.network.create_transport(addr(2)).await;
        h.router.set_contact("bob", addr(2)).await;

        // An empty file: its metafile is empty, so one good reply completes it.
        let metafile = Bytes::new();
        let metahash = ContentHash::of(&metafile);

        let cancel = CancellationToken::new();
        let transfer = h.transfer.clone();
        let task_cancel = cancel.clone();
        let download = tokio::spawn(async move {
            transfer
                .download(metahash, "empty", "bob", &task_cancel)
                .await
        });

        let request = match recv_packet(&bob).await {
            GossipPacket::DataRequest(request) => request,
            other => panic!("expected DataRequest, got {:?}", other),
        };
        assert_eq!(request.hash_value, metahash);

        let forged = DataReply {
            origin: "bob".into(),
            destination: "alice".into(),
            hop_limit: DEFAULT_HOP_LIMIT,
            hash_value: metahash,
            data: Bytes::from_static(b"not the metafile"),
        };
        let handled = h
            .transfer
            .handle_incoming_reply(forged, addr(2), &cancel)
            .await
            .unwrap();
        assert_eq!(handled, Handled::Rejected);
        assert!(h.transfer.tracker().is_pending(&metahash));
        assert!(!h.transfer.tracker().is_received(&metahash));

        let genuine = DataReply {
            origin: "bob".into(),
            destination: "alice".into(),
            hop_limit: DEFAULT_HOP_LIMIT,
            hash_value: metahash,
            data: metafile,
        };
        let handled = h
            .transfer
            .handle_incoming_reply(genuine.clone(), addr(2), &cancel)
            .await
            .unwrap();
        assert_eq!(handled, Handled::Reconstructed);

        match download.await.unwrap().unwrap() {
            DownloadOutcome::Completed(file) => assert!(file.is_complete()),
            DownloadOutcome::Skipped => panic!("download was skipped"),
        }

        // The record is gone: a late duplicate changes nothing.
        let handled = h
            .transfer
            .handle_incoming_reply(genuine, addr(2), &cancel)
            .await
            .unwrap();
        assert_eq!(handled, Handled::Ignored);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_download_stops_its_chunk_requests() {
        let h = harness("alice", 1).await;
        let bob = h.network.create_transport(addr(2)).await;
        h.router.set_contact("bob", addr(2)).await;

        let original = source_file(b"01234567");
        let meta = original.metafile().unwrap();
        let metahash = original.metahash();

        let cancel = CancellationToken::new();
        let transfer = h.transfer.clone();
        let task_cancel = cancel.clone();
        let download = tokio::spawn(async move {
            transfer
                .download(metahash, "copy", "bob", &task_cancel)
                .await
        });
        assert_eq!(recv_request(&bob).await.hash_value, metahash);

        // The node keeps running; only the download is cancelled.
        let shutdown = CancellationToken::new();
        let handled = h
            .transfer
            .handle_incoming_reply(
                reply_from_bob(metahash, meta.as_bytes().clone()),
                addr(2),
                &shutdown,
            )
            .await
            .unwrap();
        assert_eq!(handled, Handled::Progressed);
        assert_eq!(recv_request(&bob).await.hash_value, meta.chunk_hash(1).unwrap());

        cancel.cancel();
        assert!(matches!(
            download.await.unwrap(),
            Err(SyncError::Cancelled)
        ));

        let transfer = h.transfer.clone();
        wait_until(move || transfer.tracker().pending_count() == 0).await;

        let sent = h.network.history().len();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.network.history().len(), sent);
        assert!(!shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn test_downloads_of_the_same_file_share_requests() {
        let h = harness("alice", 1).await;
        let bob = h.network.create_transport(addr(2)).await;
        h.router.set_contact("bob", addr(2)).await;

        let original = source_file(b"01234567");
        let meta = original.metafile().unwrap();
        let metahash = original.metahash();

        let cancel = CancellationToken::new();
        let mut downloads = Vec::new();
        for name in ["a", "b"] {
            let transfer = h.transfer.clone();
            let cancel = cancel.clone();
            downloads.push(tokio::spawn(async move {
                transfer.download(metahash, name, "bob", &cancel).await
            }));
        }

        let shutdown = CancellationToken::new();
        let steps = [
            (metahash, meta.as_bytes().clone(), Handled::Progressed),
            (meta.chunk_hash(1).unwrap(), Bytes::from_static(b"0123"), Handled::Progressed),
            (meta.chunk_hash(2).unwrap(), Bytes::from_static(b"4567"), Handled::Reconstructed),
        ];
        let mut previous: Option<ContentHash> = None;
        for (hash, data, expected) in steps {
            assert_eq!(recv_request(&bob).await.hash_value, hash);

            // Both files wait on the one request for this hash.
            let transfer = h.transfer.clone();
            wait_until(move || {
                let tracker = transfer.tracker();
                tracker.pending_count() == 2 && previous.map_or(true, |p| !tracker.is_pending(&p))
            })
            .await;

            let handled = h
                .transfer
                .handle_incoming_reply(reply_from_bob(hash, data), addr(2), &shutdown)
                .await
                .unwrap();
            assert_eq!(handled, expected);
            previous = Some(hash);
        }

        for download in downloads {
            match download.await.unwrap().unwrap() {
                DownloadOutcome::Completed(file) => {
                    assert_eq!(file.assemble().unwrap(), Bytes::from_static(b"01234567"));
                }
                DownloadOutcome::Skipped => panic!("download was skipped"),
            }
        }

        let requests = h
            .network
            .history()
            .iter()
            .filter(|d| matches!(d.packet(), Some(GossipPacket::DataRequest(_))))
            .count();
        assert_eq!(requests, 3);

        let transfer = h.transfer.clone();
        wait_until(move || transfer.tracker().pending_count() == 0).await;
    }
}
