//! Local value store implementing spec replacement semantics.
//!
//! Mirrors the local half of `lib-storage/src/dht/storage.rs`'s `DhtStorage`,
//! trimmed to the put/put_signed/get/get_all contract spec.md §4.2 asks for
//! (the teacher's economic/proof-of-storage bookkeeping has no counterpart
//! here and is dropped).

use std::collections::HashMap;

use parking_lot::RwLock;
use rand::RngCore;

use crate::types::{now_secs, DhtKey, DhtValue, ValueType};

/// An in-process value store. A real deployment backs this with the DHT
/// network's replica set; this type is the per-node slice of that state
/// and is what `DhtClient` consults before/after talking to peers.
#[derive(Default)]
pub struct ValueStore {
    values: RwLock<HashMap<DhtKey, Vec<DhtValue>>>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unsigned put: auto-generated `value_id`, always accumulates. Old
    /// unsigned values are never deleted by us — they expire naturally.
    pub fn put(&self, key: DhtKey, data: Vec<u8>, value_type: ValueType) {
        let mut rng = rand::rngs::OsRng;
        let value_id = rng.next_u64();
        let value = DhtValue {
            data,
            value_type,
            value_id: Some(value_id),
            seq: 0,
            stored_at: now_secs(),
            signed: false,
        };
        self.values.write().entry(key).or_default().push(value);
    }

    /// Signed put with a fixed `value_id`: replaces any existing entry at
    /// the same `(key, value_id)` whose `seq` is lower. Never mixes signed
    /// and unsigned semantics at the same id.
    pub fn put_signed(&self, key: DhtKey, data: Vec<u8>, value_id: u64, seq: u32, value_type: ValueType) {
        let mut guard = self.values.write();
        let slot = guard.entry(key).or_default();

        if let Some(existing) = slot.iter_mut().find(|v| v.signed && v.value_id == Some(value_id)) {
            if seq > existing.seq {
                existing.data = data;
                existing.seq = seq;
                existing.stored_at = now_secs();
                existing.value_type = value_type;
            }
            return;
        }

        slot.push(DhtValue {
            data,
            value_type,
            value_id: Some(value_id),
            seq,
            stored_at: now_secs(),
            signed: true,
        });
    }

    /// Newest/largest surviving value at `key`: prefers the highest-`seq`
    /// signed value, falling back to the most recent unsigned one if no
    /// signed value exists. Expired entries are skipped but not removed
    /// here (removal happens via `sweep_expired`).
    pub fn get(&self, key: &DhtKey) -> Option<Vec<u8>> {
        let now = now_secs();
        let guard = self.values.read();
        let slot = guard.get(key)?;
        let live: Vec<&DhtValue> = slot.iter().filter(|v| !v.is_expired(now)).collect();

        live.iter()
            .filter(|v| v.signed)
            .max_by_key(|v| v.seq)
            .or_else(|| live.iter().max_by_key(|v| v.stored_at))
            .map(|v| v.data.clone())
    }

    /// All coexisting values at `key` (signed + unsigned), newest signed
    /// value only once (higher-seq values supersede lower ones at the same id).
    pub fn get_all(&self, key: &DhtKey) -> Vec<Vec<u8>> {
        let now = now_secs();
        let guard = self.values.read();
        let Some(slot) = guard.get(key) else { return Vec::new() };
        slot.iter().filter(|v| !v.is_expired(now)).map(|v| v.data.clone()).collect()
    }

    /// Drop values past their TTL. Call periodically from the background poller.
    pub fn sweep_expired(&self) {
        let now = now_secs();
        let mut guard = self.values.write();
        guard.retain(|_, slot| {
            slot.retain(|v| !v.is_expired(now));
            !slot.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(b: u8) -> DhtKey {
        [b; 64]
    }

    #[test]
    fn signed_replacement_keeps_newer_seq() {
        let store = ValueStore::new();
        let k = key(1);
        store.put_signed(k, b"X".to_vec(), 1, 1, ValueType::SevenDay);
        store.put_signed(k, b"Y".to_vec(), 1, 2, ValueType::SevenDay);
        assert_eq!(store.get(&k).unwrap(), b"Y");
        assert_eq!(store.get_all(&k), vec![b"Y".to_vec()]);
    }

    #[test]
    fn lower_seq_does_not_overwrite() {
        let store = ValueStore::new();
        let k = key(2);
        store.put_signed(k, b"Y".to_vec(), 1, 5, ValueType::SevenDay);
        store.put_signed(k, b"X".to_vec(), 1, 2, ValueType::SevenDay);
        assert_eq!(store.get(&k).unwrap(), b"Y");
    }

    #[test]
    fn unsigned_puts_accumulate_and_coexist() {
        let store = ValueStore::new();
        let k = key(3);
        store.put(k, b"A".to_vec(), ValueType::SevenDay);
        store.put(k, b"B".to_vec(), ValueType::SevenDay);
        assert_eq!(store.get_all(&k).len(), 2);
    }

    #[test]
    fn signed_value_preferred_over_legacy_unsigned() {
        let store = ValueStore::new();
        let k = key(4);
        store.put(k, b"legacy".to_vec(), ValueType::SevenDay);
        store.put_signed(k, b"current".to_vec(), 1, 1, ValueType::SevenDay);
        assert_eq!(store.get(&k).unwrap(), b"current");
        assert_eq!(store.get_all(&k).len(), 2);
    }

    #[test]
    fn missing_key_returns_none() {
        let store = ValueStore::new();
        assert!(store.get(&key(9)).is_none());
        assert!(store.get_all(&key(9)).is_empty());
    }
}
