//! Three-tier send orchestration (spec.md §4.5): direct TCP, then
//! ICE-mediated UDP, then the durable offline queue. The first tier that
//! delivers wins; the offline queue is the only tier that always succeeds,
//! since it never needs the recipient to be reachable right now.

use std::sync::Arc;
use std::time::Duration;

use dna_identity::Fingerprint;
use dna_queue::OutboxWriter;
use tracing::debug;

use crate::ice::IceTier;
use crate::tcp::TcpTier;

pub struct Sender {
    tcp: Arc<TcpTier>,
    ice: Arc<IceTier>,
    outbox: Arc<OutboxWriter>,
    ack_timeout: Duration,
}

impl Sender {
    pub fn new(tcp: Arc<TcpTier>, ice: Arc<IceTier>, outbox: Arc<OutboxWriter>, ack_timeout: Duration) -> Self {
        Self { tcp, ice, outbox, ack_timeout }
    }

    /// Try direct TCP, then ICE, then fall back to the recipient's durable
    /// outbox. Only the outbox tier's failure is propagated to the caller —
    /// the first two are expected to fail whenever the peer isn't currently
    /// reachable on that path.
    pub async fn send(&self, recipient: &Fingerprint, envelope: &[u8]) -> dna_queue::Result<()> {
        match self.tcp.send(recipient, envelope, self.ack_timeout).await {
            Ok(()) => return Ok(()),
            Err(e) => debug!(error = %e, "direct tcp send failed, falling back"),
        }

        if self.ice.is_ready() {
            match self.try_ice(recipient, envelope).await {
                Ok(()) => return Ok(()),
                Err(e) => debug!(error = %e, "ice send failed, falling back to offline queue"),
            }
        }

        self.outbox.append(recipient, envelope.to_vec()).await
    }

    async fn try_ice(&self, recipient: &Fingerprint, envelope: &[u8]) -> crate::error::Result<()> {
        let conn = self.ice.get_or_create(recipient).await?;
        conn.send(envelope).await?;
        conn.recv_timeout(self.ack_timeout).await?;
        Ok(())
    }
}
