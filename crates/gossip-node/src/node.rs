//! The Node: one gossip peer.
//!
//! A node owns its collaborators (routing table, file index, message log),
//! one datagram transport, and the two protocols running over it. `run`
//! receives datagrams and handles each one on its own task.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use gossip_core::{ContentHash, RumorMessage, VectorClock, CHUNK_SIZE};
use gossip_store::{
    FileIndex, MemoryFileIndex, MemoryMessageLog, MemoryRouter, MessageLog, Router, SharedFile,
};
use gossip_sync::{
    decode, AntiEntropy, DataTransfer, DownloadOutcome, GossipPacket, TransferConfig, Transport,
    UdpTransport,
};

use crate::error::Result;

/// Configuration for a node.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Name peers address this node by.
    pub name: String,
    /// Transfer protocol settings.
    pub transfer: TransferConfig,
    /// Chunk size for files this node shares.
    pub chunk_size: usize,
    /// Where reconstructed downloads are written, if anywhere.
    pub download_dir: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "node".into(),
            transfer: TransferConfig::default(),
            chunk_size: CHUNK_SIZE,
            download_dir: None,
        }
    }
}

impl NodeConfig {
    /// Default configuration for a node called `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A gossip node.
pub struct Node {
    config: NodeConfig,
    transport: Arc<dyn Transport>,
    router: Arc<MemoryRouter>,
    files: Arc<MemoryFileIndex>,
    log: Arc<MemoryMessageLog>,
    transfer: Arc<DataTransfer>,
    anti_entropy: AntiEntropy,
}

impl Node {
    /// Create a node speaking over `transport`.
    pub fn new(config: NodeConfig, transport: Arc<dyn Transport>) -> Self {
        let router = Arc::new(MemoryRouter::new());
        let mut files = MemoryFileIndex::new().with_chunk_size(config.chunk_size);
        if let Some(dir) = &config.download_dir {
            files = files.with_download_dir(dir.clone());
        }
        let files = Arc::new(files);
        let log = Arc::new(MemoryMessageLog::new());

        let transfer = Arc::new(DataTransfer::new(
            config.name.clone(),
            Arc::clone(&transport),
            router.clone(),
            files.clone(),
            config.transfer.clone(),
        ));
        let anti_entropy = AntiEntropy::new(Arc::clone(&transport), log.clone());

        Self {
            config,
            transport,
            router,
            files,
            log,
            transfer,
            anti_entropy,
        }
    }

    /// Create a node over a UDP socket bound at `addr`.
    pub async fn bind(config: NodeConfig, addr: SocketAddr) -> Result<Self> {
        let transport = UdpTransport::bind(addr).await?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The address peers reach this node at.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn router(&self) -> &MemoryRouter {
        &self.router
    }

    pub fn files(&self) -> &MemoryFileIndex {
        &self.files
    }

    pub fn log(&self) -> &MemoryMessageLog {
        &self.log
    }

    pub fn transfer(&self) -> &DataTransfer {
        &self.transfer
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Receive Loop
    // ─────────────────────────────────────────────────────────────────────────

    /// Receive and handle datagrams until `cancel` fires.
    ///
    /// Receive errors and undecodable datagrams are logged and skipped. Each
    /// packet is handled on its own task, so a handler waiting on a resend
    /// does not hold up the loop. Handler tasks observe the same token.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        tracing::info!(name = %self.name(), addr = %self.local_addr(), "node started");

        loop {
            let (bytes, sender) = tokio::select! {
                _ = cancel.cancelled() => break,
                received = self.transport.recv_from() => match received {
                    Ok(received) => received,
                    Err(e) => {
                        tracing::warn!(name = %self.name(), "receive failed: {}", e);
                        tokio::task::yield_now().await;
                        continue;
                    }
                },
            };

            let packet = match decode(&bytes) {
                Ok(packet) => packet,
                Err(e) => {
                    tracing::warn!(%sender, len = bytes.len(), "dropping datagram: {}", e);
                    continue;
                }
            };

            let node = Arc::clone(&self);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if let Err(e) = node.dispatch(packet, sender, &cancel).await {
                    if e.is_cancelled() {
                        tracing::debug!(%sender, "handler cancelled");
                    } else {
                        tracing::warn!(%sender, "handler failed: {}", e);
                    }
                }
            });
        }

        tracing::info!(name = %self.name(), "node stopped");
        Ok(())
    }

    /// Handle one decoded packet from `sender`.
    pub async fn dispatch(
        &self,
        packet: GossipPacket,
        sender: SocketAddr,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match packet {
            GossipPacket::DataRequest(request) => {
                self.transfer.handle_incoming_request(request, sender).await?;
            }
            GossipPacket::DataReply(reply) => {
                self.transfer
                    .handle_incoming_reply(reply, sender, cancel)
                    .await?;
            }
            GossipPacket::Status(status) => {
                self.anti_entropy.reconcile(&status, sender).await?;
            }
            GossipPacket::Rumor(rumor) => self.handle_rumor(rumor, sender).await?,
        }
        Ok(())
    }

    /// Accept a pushed rumor and acknowledge it with our status.
    async fn handle_rumor(&self, rumor: RumorMessage, sender: SocketAddr) -> Result<()> {
        self.router.add_contact_if_absent(&rumor.origin, sender).await;

        let (origin, id) = (rumor.origin.clone(), rumor.id);
        if self.log.insert(rumor).await {
            tracing::info!(%origin, id, %sender, "RUMOR accepted");
        } else {
            tracing::debug!(%origin, id, %sender, "rumor not next in sequence, ignored");
        }

        self.anti_entropy.send_status(sender).await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Record `addr` as the route to `peer`.
    pub async fn add_peer(&self, peer: &str, addr: SocketAddr) {
        self.router.set_contact(peer, addr).await;
    }

    /// Download the file behind `metahash` from `remote_peer` and store it
    /// as `local_filename`.
    pub async fn download(
        &self,
        metahash: ContentHash,
        local_filename: &str,
        remote_peer: &str,
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome> {
        Ok(self
            .transfer
            .download(metahash, local_filename, remote_peer, cancel)
            .await?)
    }

    /// Share the file at `path` under its file name.
    pub async fn share_file(&self, path: impl AsRef<Path>) -> Result<SharedFile> {
        Ok(self.files.index_path(path).await?)
    }

    /// Share `data` under `filename`.
    pub fn share_bytes(&self, filename: &str, data: impl Into<Bytes>) -> Result<SharedFile> {
        Ok(self.files.index_bytes(filename, data.into())?)
    }

    /// Look up a shared or downloaded file.
    pub async fn file(&self, filename: &str) -> Option<SharedFile> {
        self.files.shared_file(filename).await
    }

    /// Append a message to this node's own stream.
    pub async fn publish(&self, text: &str) -> RumorMessage {
        let rumor = self.log.publish(self.name(), text).await;
        tracing::info!(id = rumor.id, "published message");
        rumor
    }

    /// Send our vector clock to `addr`, starting an anti-entropy exchange.
    pub async fn status_to(&self, addr: SocketAddr) -> Result<()> {
        Ok(self.anti_entropy.send_status(addr).await?)
    }

    /// The local vector clock.
    pub async fn vector_clock(&self) -> VectorClock {
        self.log.get_vector_clock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gossip_sync::{encode, MemoryNetwork, MemoryTransport, StatusPacket, SyncError};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    async fn node_on(network: &Arc<MemoryNetwork>, name: &str, port: u16) -> Arc<Node> {
        let transport = network.create_transport(addr(port)).await;
        Arc::new(Node::new(NodeConfig::named(name), Arc::new(transport)))
    }

    /// Fails its first receive, then behaves like the wrapped transport.
    struct FlakyTransport {
        inner: MemoryTransport,
        failed: AtomicBool,
    }

    #[async_trait::async_trait]
    impl Transport for FlakyTransport {
        async fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> gossip_sync::Result<()> {
            self.inner.send_to(bytes, addr).await
        }

        async fn recv_from(&self) -> gossip_sync::Result<(Vec<u8>, SocketAddr)> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(SyncError::TransportError("connection reset".into()));
            }
            self.inner.recv_from().await
        }

        fn local_addr(&self) -> SocketAddr {
            self.inner.local_addr()
        }
    }

    async fn next_packet(transport: &MemoryTransport) -> GossipPacket {
        let (bytes, _) = transport.recv_from().await.unwrap();
        decode(&bytes).unwrap()
    }

    #[test]
    fn test_config_from_json_keeps_defaults() {
        let config: NodeConfig = serde_json::from_str(
            r#"{ "name": "alice", "chunk_size": 1024, "transfer": { "hop_limit": 4 } }"#,
        )
        .unwrap();

        assert_eq!(config.name, "alice");
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.transfer.hop_limit, 4);
        assert_eq!(config.transfer.resend_interval, Duration::from_secs(5));
        assert!(config.download_dir.is_none());
    }

    #[tokio::test]
    async fn test_rumor_is_stored_and_acknowledged() {
        let network = MemoryNetwork::new();
        let node = node_on(&network, "bob", 2).await;
        let alice = network.create_transport(addr(1)).await;
        let cancel = CancellationToken::new();

        node.dispatch(
            GossipPacket::Rumor(RumorMessage::new("alice", 1, "hi")),
            addr(1),
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(node.router().get_target("alice").await, Some(addr(1)));
        assert_eq!(node.log().get("alice", 1).unwrap().text, "hi");

        match next_packet(&alice).await {
            GossipPacket::Status(status) => {
                assert_eq!(status.to_clock(), VectorClock::new().with("alice", 2));
            }
            other => panic!("expected Status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_out_of_order_rumor_is_not_stored() {
        let network = MemoryNetwork::new();
        let node = node_on(&network, "bob", 2).await;
        let _alice = network.create_transport(addr(1)).await;

        node.dispatch(
            GossipPacket::Rumor(RumorMessage::new("alice", 3, "later")),
            addr(1),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(node.vector_clock().await.is_empty());
    }

    #[tokio::test]
    async fn test_run_survives_garbage_and_stops_on_cancel() {
        let network = MemoryNetwork::new();
        let node = node_on(&network, "bob", 2).await;
        let alice = network.create_transport(addr(1)).await;
        node.publish("first").await;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&node).run(cancel.clone()));

        alice.send_to(b"\xff\x00 not a packet", addr(2)).await.unwrap();
        let status = GossipPacket::Status(StatusPacket::default());
        alice
            .send_to(&encode(&status).unwrap(), addr(2))
            .await
            .unwrap();

        // The garbage was skipped and the status answered with a push.
        match next_packet(&alice).await {
            GossipPacket::Rumor(rumor) => {
                assert_eq!(rumor, RumorMessage::new("bob", 1, "first"));
            }
            other => panic!("expected Rumor, got {:?}", other),
        }

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_share_and_look_up() {
        let network = MemoryNetwork::new();
        let node = node_on(&network, "bob", 2).await;

        let shared = node
            .share_bytes("notes.txt", &b"some notes"[..])
            .unwrap();
        let found = node.file("notes.txt").await.unwrap();
        assert_eq!(found.metahash(), shared.metahash());
        assert!(node.file("missing.txt").await.is_none());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.bin");
        std::fs::write(&path, vec![7u8; 20_000]).unwrap();
        let file = node.share_file(&path).await.unwrap();
        assert_eq!(file.metafile().unwrap().chunk_count(), 3);
    }

    #[tokio::test]
    async fn test_run_keeps_serving_after_receive_error() {
        let network = MemoryNetwork::new();
        let transport = FlakyTransport {
            inner: network.create_transport(addr(2)).await,
            failed: AtomicBool::new(false),
        };
        let node = Arc::new(Node::new(NodeConfig::named("bob"), Arc::new(transport)));
        let alice = network.create_transport(addr(1)).await;
        node.publish("first").await;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&node).run(cancel.clone()));

        let status = GossipPacket::Status(StatusPacket::default());
        alice
            .send_to(&encode(&status).unwrap(), addr(2))
            .await
            .unwrap();

        match next_packet(&alice).await {
            GossipPacket::Rumor(rumor) => assert_eq!(rumor.id, 1),
            other => panic!("expected Rumor, got {:?}", other),
        }
        assert!(!handle.is_finished());

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
