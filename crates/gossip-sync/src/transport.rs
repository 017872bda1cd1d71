//! Datagram transport abstraction.
//!
//! The transport moves opaque datagrams between socket addresses. It makes no
//! delivery promises: datagrams may be lost, duplicated or reordered, and
//! nothing here retries. Retrying is the timeout tracker's job.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use crate::codec::{self, MAX_DATAGRAM_SIZE};
use crate::error::{Result, SyncError};
use crate::messages::GossipPacket;

/// Transport trait for sending and receiving datagrams.
///
/// Implementations must be thread-safe (Send + Sync); one handle is shared by
/// every concurrent download and handler task.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one datagram to `addr`.
    async fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> Result<()>;

    /// Receive the next datagram and the address it came from.
    async fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr)>;

    /// The address peers reach this transport at.
    fn local_addr(&self) -> SocketAddr;
}

/// Encode `packet` and send it to `addr`.
pub async fn send_packet(
    transport: &dyn Transport,
    packet: &GossipPacket,
    addr: SocketAddr,
) -> Result<()> {
    let bytes = codec::encode(packet)?;
    transport.send_to(&bytes, addr).await
}

/// UDP transport over a tokio socket.
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind a socket at `addr`.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| SyncError::TransportError(format!("bind {}: {}", addr, e)))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| SyncError::TransportError(e.to_string()))?;
        Ok(Self { socket, local_addr })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> Result<()> {
        self.socket
            .send_to(bytes, addr)
            .await
            .map_err(|e| SyncError::SendFailed(format!("{}: {}", addr, e)))?;
        Ok(())
    }

    async fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, from) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(|e| SyncError::TransportError(e.to_string()))?;
        buf.truncate(len);
        Ok((buf, from))
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// An in-memory datagram network for testing.
///
/// Uses channels to simulate delivery between addresses, with optional random
/// loss and duplication. Every datagram handed to the network is recorded.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex, PoisonError};
    use tokio::sync::{mpsc, RwLock};

    /// A datagram in flight.
    #[derive(Debug, Clone)]
    struct Datagram {
        from: SocketAddr,
        bytes: Vec<u8>,
    }

    /// Record of one datagram handed to the network.
    #[derive(Debug, Clone)]
    pub struct Delivery {
        pub from: SocketAddr,
        pub to: SocketAddr,
        pub bytes: Vec<u8>,
        /// True if the simulated network lost it.
        pub dropped: bool,
    }

    impl Delivery {
        /// Decode the recorded datagram.
        pub fn packet(&self) -> Option<GossipPacket> {
            codec::decode(&self.bytes).ok()
        }
    }

    /// Shared state for the memory transport network.
    pub struct MemoryNetwork {
        /// Inbox of each bound address.
        endpoints: RwLock<HashMap<SocketAddr, mpsc::Sender<Datagram>>>,
        loss_rate: f64,
        duplicate_rate: f64,
        history: Mutex<Vec<Delivery>>,
    }

    impl MemoryNetwork {
        /// Create a lossless network.
        pub fn new() -> Arc<Self> {
            Self::with_faults(0.0, 0.0)
        }

        /// Create a network that drops datagrams with probability `loss_rate`
        /// and delivers them twice with probability `duplicate_rate`.
        pub fn with_faults(loss_rate: f64, duplicate_rate: f64) -> Arc<Self> {
            Arc::new(Self {
                endpoints: RwLock::new(HashMap::new()),
                loss_rate: loss_rate.clamp(0.0, 1.0),
                duplicate_rate: duplicate_rate.clamp(0.0, 1.0),
                history: Mutex::new(Vec::new()),
            })
        }

        /// Create a transport bound to `addr` on this network.
        pub async fn create_transport(self: &Arc<Self>, addr: SocketAddr) -> MemoryTransport {
            let (tx, rx) = mpsc::channel(1000);

            self.endpoints.write().await.insert(addr, tx);

            MemoryTransport {
                addr,
                network: Arc::clone(self),
                receiver: tokio::sync::Mutex::new(rx),
            }
        }

        /// Every datagram sent so far, in send order.
        pub fn history(&self) -> Vec<Delivery> {
            self.history
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        fn record(&self, delivery: Delivery) {
            self.history
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(delivery);
        }
    }

    impl Default for MemoryNetwork {
        fn default() -> Self {
            Self {
                endpoints: RwLock::new(HashMap::new()),
                loss_rate: 0.0,
                duplicate_rate: 0.0,
                history: Mutex::new(Vec::new()),
            }
        }
    }

    /// In-memory transport implementation.
    pub struct MemoryTransport {
        addr: SocketAddr,
        network: Arc<MemoryNetwork>,
        receiver: tokio::sync::Mutex<mpsc::Receiver<Datagram>>,
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> Result<()> {
            let sender = self
                .network
                .endpoints
                .read()
                .await
                .get(&addr)
                .cloned()
                .ok_or_else(|| SyncError::SendFailed(format!("no endpoint at {}", addr)))?;

            let dropped = rand::random::<f64>() < self.network.loss_rate;
            let copies = if rand::random::<f64>() < self.network.duplicate_rate {
                2
            } else {
                1
            };

            self.network.record(Delivery {
                from: self.addr,
                to: addr,
                bytes: bytes.to_vec(),
                dropped,
            });
            if dropped {
                return Ok(());
            }

            for _ in 0..copies {
                let datagram = Datagram {
                    from: self.addr,
                    bytes: bytes.to_vec(),
                };
                sender
                    .send(datagram)
                    .await
                    .map_err(|_| SyncError::SendFailed(format!("{} closed", addr)))?;
            }
            Ok(())
        }

        async fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr)> {
            let mut rx = self.receiver.lock().await;
            match rx.recv().await {
                Some(datagram) => Ok((datagram.bytes, datagram.from)),
                None => Err(SyncError::TransportError("channel closed".into())),
            }
        }

        fn local_addr(&self) -> SocketAddr {
            self.addr
        }
    }
}
