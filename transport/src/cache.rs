//! Fixed-capacity connection cache keyed by `(kind, peer_fingerprint)`.
//!
//! Generalizes `lib-network/src/mesh/connection.rs`'s tagged-union
//! `MeshConnection` (Bluetooth / WiFi-Direct / relay / ...) down to the two
//! tiers this system actually dials: a TCP socket or an ICE peer connection.
//! Eviction is plain LRU by `last_used`, since neither tier benefits from the
//! teacher's quality/uptime scoring.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dna_identity::Fingerprint;
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;

use crate::ice::IcePeerConnection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnKind {
    Tcp,
    Ice,
}

#[derive(Clone)]
pub enum ConnHandle {
    Tcp(Arc<AsyncMutex<TcpStream>>),
    Ice(Arc<IcePeerConnection>),
}

struct Entry {
    handle: ConnHandle,
    last_used: u64,
}

/// Holds at most `capacity` live connections across both tiers combined,
/// evicting the least-recently-used entry to make room for a new one.
/// Recency is tracked with a monotonic counter rather than a wall clock —
/// two accesses in the same instant must still order unambiguously.
pub struct ConnectionCache {
    capacity: usize,
    clock: AtomicU64,
    entries: Mutex<HashMap<(ConnKind, Fingerprint), Entry>>,
}

impl ConnectionCache {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self { capacity, clock: AtomicU64::new(0), entries: Mutex::new(HashMap::new()) })
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    pub fn get(&self, kind: ConnKind, fp: &Fingerprint) -> Option<ConnHandle> {
        let tick = self.tick();
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(&(kind, *fp))?;
        entry.last_used = tick;
        Some(entry.handle.clone())
    }

    pub fn insert(&self, kind: ConnKind, fp: Fingerprint, handle: ConnHandle) {
        let tick = self.tick();
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity && !entries.contains_key(&(kind, fp)) {
            if let Some(oldest_key) = entries.iter().min_by_key(|(_, e)| e.last_used).map(|(k, _)| *k) {
                entries.remove(&oldest_key);
            }
        }
        entries.insert((kind, fp), Entry { handle, last_used: tick });
    }

    pub fn remove(&self, kind: ConnKind, fp: &Fingerprint) {
        self.entries.lock().remove(&(kind, *fp));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
