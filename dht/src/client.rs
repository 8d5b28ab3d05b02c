//! DHT client: local store + best-effort replication to known peers.
//!
//! Generalizes `lib-storage/src/dht/node.rs`'s `DhtNodeManager` (which
//! splits "local store" from "network interface") into the single
//! put/put_signed/get/get_all/get_async/chunked_store/chunked_fetch
//! contract spec.md §4.2 names. Peer fan-out uses the pending-response map +
//! timeout idiom from `lib-storage/src/dht/messaging.rs`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dna_crypto::sha3_512;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{DhtError, Result};
use crate::protocol::DhtMessage;
use crate::store::ValueStore;
use crate::transport::{DhtTransport, UdpDhtTransport};
use crate::types::{ChunkMetadata, DhtKey, ValueType};

const CHUNK_SIZE: usize = 50_000;
const PEER_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

type PendingMap = Mutex<HashMap<u64, oneshot::Sender<DhtMessage>>>;

/// A DHT client bound to one local node.
pub struct DhtClient {
    store: Arc<ValueStore>,
    transport: Arc<dyn DhtTransport>,
    peers: Mutex<Vec<SocketAddr>>,
    pending: Arc<PendingMap>,
    next_request_id: AtomicU64,
}

impl DhtClient {
    /// Bind a UDP transport and spawn the background receive loop.
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Arc<Self>> {
        let transport: Arc<dyn DhtTransport> = Arc::new(UdpDhtTransport::bind(addr).await?);
        Ok(Self::new(transport))
    }

    pub fn new(transport: Arc<dyn DhtTransport>) -> Arc<Self> {
        let client = Arc::new(Self {
            store: Arc::new(ValueStore::new()),
            transport,
            peers: Mutex::new(Vec::new()),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_request_id: AtomicU64::new(1),
        });
        client.clone().spawn_receive_loop();
        client
    }

    fn spawn_receive_loop(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                let (bytes, from) = match self.transport.recv().await {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(error = %e, "dht transport recv failed");
                        continue;
                    }
                };
                if let Ok(msg) = bincode::deserialize::<DhtMessage>(&bytes) {
                    self.clone().handle_incoming(msg, from).await;
                }
            }
        });
    }

    async fn handle_incoming(self: Arc<Self>, msg: DhtMessage, from: SocketAddr) {
        match msg {
            DhtMessage::Put { request_id, key, data, value_type, value_id, seq } => {
                match value_id {
                    Some(id) => self.store.put_signed(key, data, id, seq, value_type),
                    None => self.store.put(key, data, value_type),
                }
                let ack = DhtMessage::PutAck { request_id };
                if let Ok(bytes) = bincode::serialize(&ack) {
                    let _ = self.transport.send(&bytes, from).await;
                }
            }
            DhtMessage::Get { request_id, key, all } => {
                let values = if all { self.store.get_all(&key) } else { self.store.get(&key).into_iter().collect() };
                let resp = DhtMessage::GetResponse { request_id, values };
                if let Ok(bytes) = bincode::serialize(&resp) {
                    let _ = self.transport.send(&bytes, from).await;
                }
            }
            other => {
                let id = other.request_id();
                if let Some(tx) = self.pending.lock().remove(&id) {
                    let _ = tx.send(other);
                }
            }
        }
    }

    pub fn add_peer(&self, peer: SocketAddr) {
        let mut peers = self.peers.lock();
        if !peers.contains(&peer) {
            peers.push(peer);
        }
    }

    fn alloc_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn send_request(&self, msg: DhtMessage, peer: SocketAddr) -> anyhow::Result<DhtMessage> {
        let id = msg.request_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        let bytes = bincode::serialize(&msg)?;
        self.transport.send(&bytes, peer).await?;
        match tokio::time::timeout(PEER_QUERY_TIMEOUT, rx).await {
            Ok(Ok(resp)) => Ok(resp),
            _ => {
                self.pending.lock().remove(&id);
                Err(anyhow::anyhow!("dht peer request timed out"))
            }
        }
    }

    /// Unsigned put: accumulates locally, fans out best-effort to known peers.
    pub async fn put(&self, key: DhtKey, data: Vec<u8>, value_type: ValueType) {
        self.store.put(key, data.clone(), value_type);
        self.replicate(DhtMessage::Put {
            request_id: self.alloc_request_id(),
            key,
            data,
            value_type,
            value_id: None,
            seq: 0,
        })
        .await;
    }

    /// Signed put with a fixed `value_id`: replaces on higher `seq`.
    pub async fn put_signed(&self, key: DhtKey, data: Vec<u8>, value_id: u64, seq: u32, value_type: ValueType) {
        self.store.put_signed(key, data.clone(), value_id, seq, value_type);
        self.replicate(DhtMessage::Put {
            request_id: self.alloc_request_id(),
            key,
            data,
            value_type,
            value_id: Some(value_id),
            seq,
        })
        .await;
    }

    async fn replicate(&self, msg: DhtMessage) {
        let peers = self.peers.lock().clone();
        for peer in peers {
            if let Ok(bytes) = bincode::serialize(&msg) {
                if let Err(e) = self.transport.send(&bytes, peer).await {
                    debug!(%peer, error = %e, "dht replication send failed");
                }
            }
        }
    }

    /// Newest/largest value at `key`, checking the local store first and
    /// falling through to known peers on a miss.
    pub async fn get(&self, key: &DhtKey) -> Option<Vec<u8>> {
        if let Some(v) = self.store.get(key) {
            return Some(v);
        }
        self.get_from_peers(key, false).await.into_iter().next()
    }

    /// All coexisting values at `key`.
    pub async fn get_all(&self, key: &DhtKey) -> Vec<Vec<u8>> {
        let mut local = self.store.get_all(key);
        if local.is_empty() {
            local = self.get_from_peers(key, true).await;
        }
        local
    }

    /// Issues one request per known peer concurrently so an N-peer fan-out
    /// costs one round trip, not N.
    async fn get_from_peers(&self, key: &DhtKey, all: bool) -> Vec<Vec<u8>> {
        let peers = self.peers.lock().clone();
        let futures: Vec<_> = peers
            .into_iter()
            .map(|peer| {
                let msg = DhtMessage::Get { request_id: self.alloc_request_id(), key: *key, all };
                self.send_request(msg, peer)
            })
            .collect();

        let mut out = Vec::new();
        for result in futures::future::join_all(futures).await {
            if let Ok(DhtMessage::GetResponse { values, .. }) = result {
                out.extend(values);
            }
        }
        out
    }

    /// Fire-and-forget get: spawns a task that resolves `get` and invokes
    /// `callback` with either the value or `None`. The callback runs on a
    /// tokio task, mirroring the DHT runtime's own foreign-thread callbacks.
    pub fn get_async<F>(self: &Arc<Self>, key: DhtKey, callback: F)
    where
        F: FnOnce(Option<Vec<u8>>) + Send + 'static,
    {
        let this = self.clone();
        tokio::spawn(async move {
            let value = this.get(&key).await;
            callback(value);
        });
    }

    /// Split `data` into 50 KB chunks, publish each under
    /// `SHA3-512(base_key || ":vN:chunkK")`, plus a metadata record at
    /// `SHA3-512(base_key || ":vN:meta")`.
    pub async fn chunked_store(&self, base_key: &[u8], version: u32, data: &[u8], value_type: ValueType) {
        let chunks: Vec<&[u8]> = data.chunks(CHUNK_SIZE).collect();
        for (i, chunk) in chunks.iter().enumerate() {
            let key = chunk_key(base_key, version, i as u32);
            self.put_signed(key, chunk.to_vec(), 1, 0, value_type).await;
        }
        let meta = ChunkMetadata { chunks: chunks.len() as u32, total_size: data.len() as u64 };
        let meta_bytes = serde_json::to_vec(&meta).expect("ChunkMetadata always serializes");
        self.put_signed(meta_key(base_key, version), meta_bytes, 1, 0, value_type).await;
    }

    /// Reassemble a value published with `chunked_store`. Fails with
    /// `MissingChunk` if any chunk is absent — never returns a truncated value.
    pub async fn chunked_fetch(&self, base_key: &[u8], version: u32) -> Result<Option<Vec<u8>>> {
        let Some(meta_bytes) = self.get(&meta_key(base_key, version)).await else {
            return Ok(None);
        };
        let meta: ChunkMetadata = serde_json::from_slice(&meta_bytes)?;

        let mut out = Vec::with_capacity(meta.total_size as usize);
        for i in 0..meta.chunks {
            let key = chunk_key(base_key, version, i);
            match self.get(&key).await {
                Some(chunk) => out.extend_from_slice(&chunk),
                None => return Err(DhtError::MissingChunk { index: i }),
            }
        }
        Ok(Some(out))
    }
}

fn chunk_key(base_key: &[u8], version: u32, index: u32) -> DhtKey {
    let mut buf = base_key.to_vec();
    buf.extend_from_slice(format!(":v{version}:chunk{index}").as_bytes());
    sha3_512(&buf)
}

fn meta_key(base_key: &[u8], version: u32) -> DhtKey {
    let mut buf = base_key.to_vec();
    buf.extend_from_slice(format!(":v{version}:meta").as_bytes());
    sha3_512(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_key() -> Vec<u8> {
        b"group-uuid-1234".to_vec()
    }

    #[tokio::test]
    async fn chunked_roundtrip_exactly_one_chunk() {
        let client = DhtClient::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let data = vec![7u8; 50_000];
        client.chunked_store(&base_key(), 0, &data, ValueType::SevenDay).await;
        let fetched = client.chunked_fetch(&base_key(), 0).await.unwrap().unwrap();
        assert_eq!(fetched, data);
    }

    #[tokio::test]
    async fn chunked_roundtrip_two_chunks() {
        let client = DhtClient::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let data = vec![9u8; 50_001];
        client.chunked_store(&base_key(), 1, &data, ValueType::SevenDay).await;
        let fetched = client.chunked_fetch(&base_key(), 1).await.unwrap().unwrap();
        assert_eq!(fetched, data);
    }

    #[tokio::test]
    async fn chunked_roundtrip_four_chunks() {
        let client = DhtClient::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        client.chunked_store(&base_key(), 2, &data, ValueType::SevenDay).await;
        let fetched = client.chunked_fetch(&base_key(), 2).await.unwrap().unwrap();
        assert_eq!(fetched, data);
    }

    #[tokio::test]
    async fn missing_value_fetch_returns_none() {
        let client = DhtClient::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        assert!(client.chunked_fetch(&base_key(), 99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let client = DhtClient::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let key = sha3_512(b"some-key");
        client.put_signed(key, b"hello".to_vec(), 1, 1, ValueType::SevenDay).await;
        assert_eq!(client.get(&key).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn get_async_invokes_callback() {
        let client = DhtClient::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let key = sha3_512(b"async-key");
        client.put_signed(key, b"async-value".to_vec(), 1, 1, ValueType::SevenDay).await;

        let (tx, rx) = oneshot::channel();
        client.get_async(key, move |value| {
            let _ = tx.send(value);
        });
        let value = rx.await.unwrap();
        assert_eq!(value.unwrap(), b"async-value");
    }
}
