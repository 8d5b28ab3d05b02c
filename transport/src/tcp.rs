//! Tier-1 direct transport: a persistent TCP listener bound once at startup,
//! with a dedicated receive task per accepted connection.
//!
//! Framing is `framing::read_frame`/`write_frame`, grounded directly on
//! `lib-protocols/src/wire/mod.rs`'s `read_framed_message`/
//! `write_framed_message`. Reachability uses the same named-DHT-key idiom as
//! this system's presence/candidate records: each node publishes its own
//! listen address so a peer can look it up before dialing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dna_dht::{DhtClient, DhtKey, ValueType};
use dna_identity::Fingerprint;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::framing::{read_frame, write_frame};

const ACK: &[u8] = b"ACK";
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(10);

pub fn listen_addr_key(fingerprint: &Fingerprint) -> DhtKey {
    let mut buf = fingerprint.to_vec();
    buf.extend_from_slice(b":tcp_addr");
    dna_crypto::sha3_512(&buf)
}

pub struct TcpTier {
    dht: Arc<DhtClient>,
    max_frame_bytes: u32,
    on_envelope: Arc<dyn Fn(Vec<u8>) + Send + Sync>,
}

impl TcpTier {
    pub fn new(dht: Arc<DhtClient>, max_frame_bytes: u32, on_envelope: Arc<dyn Fn(Vec<u8>) + Send + Sync>) -> Arc<Self> {
        Arc::new(Self { dht, max_frame_bytes, on_envelope })
    }

    /// Bind the listener, publish its address for this identity, and spawn
    /// the accept loop. Each accepted socket gets its own receive task.
    pub async fn listen(self: &Arc<Self>, fingerprint: Fingerprint, addr: SocketAddr) -> Result<SocketAddr> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        self.dht
            .put_signed(listen_addr_key(&fingerprint), local_addr.to_string().into_bytes(), 1, 1, ValueType::SevenDay)
            .await;

        let this = self.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((socket, peer_addr)) => {
                        let this = this.clone();
                        tokio::spawn(async move { this.receive_loop(socket, peer_addr).await });
                    }
                    Err(e) => {
                        warn!(error = %e, "tcp accept failed");
                    }
                }
            }
        });
        Ok(local_addr)
    }

    async fn receive_loop(&self, mut socket: TcpStream, peer_addr: SocketAddr) {
        loop {
            match read_frame(&mut socket, self.max_frame_bytes).await {
                Ok(envelope) => {
                    (self.on_envelope)(envelope);
                    if let Err(e) = write_frame(&mut socket, ACK, self.max_frame_bytes).await {
                        debug!(%peer_addr, error = %e, "failed to ack tcp frame");
                        return;
                    }
                }
                Err(_) => {
                    debug!(%peer_addr, "tcp receive loop closing");
                    return;
                }
            }
        }
    }

    /// Look up `peer`'s published listen address and return it, or
    /// `Unreachable` if it has never published one (or its record expired).
    pub async fn resolve(&self, peer: &Fingerprint) -> Result<SocketAddr> {
        let bytes = self.dht.get(&listen_addr_key(peer)).await.ok_or(TransportError::Unreachable)?;
        String::from_utf8(bytes)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(TransportError::Unreachable)
    }

    /// Connect to `peer`, send one framed envelope, and wait for its ack.
    /// Never returns a partial write: `write_frame` itself loops to
    /// completion before this ever awaits the reply.
    pub async fn send(&self, peer: &Fingerprint, envelope: &[u8], timeout: Duration) -> Result<()> {
        let addr = self.resolve(peer).await?;
        let connect = tokio::time::timeout(timeout, TcpStream::connect(addr));
        let mut socket = connect.await.map_err(|_| TransportError::Timeout)??;

        tokio::time::timeout(timeout, write_frame(&mut socket, envelope, self.max_frame_bytes))
            .await
            .map_err(|_| TransportError::Timeout)??;

        let ack = tokio::time::timeout(timeout, read_frame(&mut socket, self.max_frame_bytes))
            .await
            .map_err(|_| TransportError::Timeout)??;
        if ack != ACK {
            return Err(TransportError::BadAck);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn send_receives_an_ack_and_delivers_the_envelope() {
        let dht_a = DhtClient::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let dht_b = dht_a.clone();
        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = received.clone();

        let bob_fp = [7u8; 64];
        let bob = TcpTier::new(
            dht_a,
            crate::framing::DEFAULT_MAX_FRAME_BYTES,
            Arc::new(move |_env| {
                received_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        bob.listen(bob_fp, "127.0.0.1:0".parse().unwrap()).await.unwrap();

        let alice = TcpTier::new(dht_b, crate::framing::DEFAULT_MAX_FRAME_BYTES, Arc::new(|_| {}));
        alice.send(&bob_fp, b"hello", Duration::from_secs(2)).await.unwrap();

        // Give the spawned receive task a moment to run before asserting.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn send_to_an_unpublished_peer_is_unreachable() {
        let dht = DhtClient::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let tier = TcpTier::new(dht, crate::framing::DEFAULT_MAX_FRAME_BYTES, Arc::new(|_| {}));
        let err = tier.send(&[99u8; 64], b"hi", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, TransportError::Unreachable));
    }
}
