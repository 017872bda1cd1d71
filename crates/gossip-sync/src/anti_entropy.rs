//! Vector-clock anti-entropy.
//!
//! On each received status the node does exactly one of three things:
//! push one rumor the peer lacks, do nothing, or send its own status back so
//! the peer pushes what we lack.

use std::net::SocketAddr;
use std::sync::Arc;

use gossip_core::RumorMessage;
use gossip_store::MessageLog;

use crate::error::Result;
use crate::messages::{GossipPacket, StatusPacket};
use crate::transport::{send_packet, Transport};

/// Action taken in answer to a status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// A rumor the peer lacked was sent to it.
    Pushed(RumorMessage),
    /// Nothing to exchange.
    InSync,
    /// The peer knows more; our status was sent back.
    RequestedPull,
}

/// Anti-entropy against a shared message log.
pub struct AntiEntropy {
    transport: Arc<dyn Transport>,
    log: Arc<dyn MessageLog>,
}

impl AntiEntropy {
    pub fn new(transport: Arc<dyn Transport>, log: Arc<dyn MessageLog>) -> Self {
        Self { transport, log }
    }

    /// Answer a status received from `sender`.
    pub async fn reconcile(
        &self,
        status: &StatusPacket,
        sender: SocketAddr,
    ) -> Result<Reconciliation> {
        let peer = status.to_clock();

        if let Some(rumor) = self.log.get_unknown_message_target(&peer).await {
            tracing::debug!(
                origin = %rumor.origin,
                id = rumor.id,
                %sender,
                "pushing rumor to lagging peer"
            );
            send_packet(
                self.transport.as_ref(),
                &GossipPacket::Rumor(rumor.clone()),
                sender,
            )
            .await?;
            return Ok(Reconciliation::Pushed(rumor));
        }

        if self.log.is_local_status_complete(&peer).await {
            tracing::debug!(%sender, "in sync with peer");
            return Ok(Reconciliation::InSync);
        }

        self.send_status(sender).await?;
        Ok(Reconciliation::RequestedPull)
    }

    /// Send the local vector clock to `addr`.
    pub async fn send_status(&self, addr: SocketAddr) -> Result<()> {
        let clock = self.log.get_vector_clock().await;
        let packet = GossipPacket::Status(StatusPacket::from(&clock));
        send_packet(self.transport.as_ref(), &packet, addr).await
    }
}
