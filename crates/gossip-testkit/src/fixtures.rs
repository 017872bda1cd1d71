//! Test fixtures and helpers.
//!
//! A [`TestCluster`] puts several nodes on one in-memory network and runs
//! their receive loops until shut down.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use bytes::Bytes;
use rand::RngCore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use gossip_node::{Node, NodeConfig};
use gossip_sync::MemoryNetwork;

/// First port handed out to cluster nodes.
const BASE_PORT: u16 = 40_000;

/// Install a test-writer subscriber so `tracing` output shows up in failing
/// tests. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Node configuration tuned for tests: short resend interval and small chunks.
pub fn fast_config(name: &str) -> NodeConfig {
    let mut config = NodeConfig::named(name);
    config.transfer.resend_interval = Duration::from_millis(50);
    config.chunk_size = 1024;
    config
}

/// `len` random bytes. Random content keeps chunk hashes distinct.
pub fn random_bytes(len: usize) -> Bytes {
    let mut buf = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut buf);
    Bytes::from(buf)
}

/// Several running nodes on one in-memory network.
pub struct TestCluster {
    network: Arc<MemoryNetwork>,
    nodes: Vec<Arc<Node>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<gossip_node::Result<()>>>,
}

impl TestCluster {
    /// Nodes with [`fast_config`] on a lossless network, no routes yet.
    pub async fn new(names: &[&str]) -> anyhow::Result<Self> {
        Self::on_network(MemoryNetwork::new(), names, fast_config).await
    }

    /// Nodes on `network`, each configured by `config`.
    pub async fn on_network(
        network: Arc<MemoryNetwork>,
        names: &[&str],
        config: impl Fn(&str) -> NodeConfig,
    ) -> anyhow::Result<Self> {
        init_tracing();

        let cancel = CancellationToken::new();
        let mut nodes = Vec::with_capacity(names.len());
        let mut tasks = Vec::with_capacity(names.len());

        for (i, name) in names.iter().enumerate() {
            let offset = u16::try_from(i).context("too many nodes")?;
            let addr = SocketAddr::from(([127, 0, 0, 1], BASE_PORT + offset));
            let transport = network.create_transport(addr).await;
            let node = Arc::new(Node::new(config(name), Arc::new(transport)));

            tasks.push(tokio::spawn(Arc::clone(&node).run(cancel.clone())));
            nodes.push(node);
        }

        Ok(Self {
            network,
            nodes,
            cancel,
            tasks,
        })
    }

    /// Nodes that all know each other directly.
    pub async fn mesh(names: &[&str]) -> anyhow::Result<Self> {
        let cluster = Self::new(names).await?;
        cluster.route_mesh().await;
        Ok(cluster)
    }

    /// Nodes in a line. Each node reaches the others only through its
    /// neighbour on their side.
    pub async fn line(names: &[&str]) -> anyhow::Result<Self> {
        let cluster = Self::new(names).await?;
        cluster.route_line().await;
        Ok(cluster)
    }

    /// Route every node directly to every other node.
    pub async fn route_mesh(&self) {
        for node in &self.nodes {
            for other in &self.nodes {
                if !Arc::ptr_eq(node, other) {
                    node.add_peer(other.name(), other.local_addr()).await;
                }
            }
        }
    }

    /// Route every node through its neighbours, in `names` order.
    pub async fn route_line(&self) {
        for (i, node) in self.nodes.iter().enumerate() {
            for (j, other) in self.nodes.iter().enumerate() {
                let next_hop = match j.cmp(&i) {
                    std::cmp::Ordering::Equal => continue,
                    std::cmp::Ordering::Greater => &self.nodes[i + 1],
                    std::cmp::Ordering::Less => &self.nodes[i - 1],
                };
                node.add_peer(other.name(), next_hop.local_addr()).await;
            }
        }
    }

    /// The node called `name`.
    pub fn node(&self, name: &str) -> anyhow::Result<&Arc<Node>> {
        self.nodes
            .iter()
            .find(|n| n.name() == name)
            .ok_or_else(|| anyhow!("no node named {}", name))
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn network(&self) -> &Arc<MemoryNetwork> {
        &self.network
    }

    /// The token that stops the cluster's receive loops.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop every receive loop and surface the first loop error.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.cancel.cancel();
        for task in self.tasks {
            task.await.context("receive loop panicked")??;
        }
        Ok(())
    }
}
