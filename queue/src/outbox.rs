//! Outbox blob framing and the append/clear write path (spec.md §4.4).
//!
//! Grounded on `lib-storage/src/dht/storage.rs`'s fetch-modify-replace
//! pattern for signed slots, narrowed to the single fixed `value_id = 1`
//! outbox record this system uses instead of that store's general-purpose
//! versioned records.

use std::sync::Arc;

use dashmap::DashMap;
use dna_dht::{DhtClient, DhtKey, ValueType};
use dna_identity::Fingerprint;
use tokio::sync::Mutex;

use crate::error::{QueueError, Result};

pub const OUTBOX_CAPACITY_BYTES: usize = 50_000;
const OUTBOX_VALUE_ID: u64 = 1;

pub fn outbox_key(recipient_fingerprint: &Fingerprint) -> DhtKey {
    let mut buf = recipient_fingerprint.to_vec();
    buf.extend_from_slice(b":outbox");
    dna_crypto::sha3_512(&buf)
}

/// `count(u32 BE)` followed by `count` `length(u32 BE) || envelope` entries.
pub fn frame_entries(envelopes: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + envelopes.iter().map(|e| 4 + e.len()).sum::<usize>());
    out.extend_from_slice(&(envelopes.len() as u32).to_be_bytes());
    for envelope in envelopes {
        out.extend_from_slice(&(envelope.len() as u32).to_be_bytes());
        out.extend_from_slice(envelope);
    }
    out
}

pub fn parse_entries(blob: &[u8]) -> Result<Vec<Vec<u8>>> {
    if blob.len() < 4 {
        return Err(QueueError::Malformed("blob shorter than the count field".into()));
    }
    let count = u32::from_be_bytes(blob[0..4].try_into().unwrap()) as usize;
    let mut offset = 4;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        if offset + 4 > blob.len() {
            return Err(QueueError::Malformed("truncated entry length".into()));
        }
        let len = u32::from_be_bytes(blob[offset..offset + 4].try_into().unwrap()) as usize;
        offset += 4;
        if offset + len > blob.len() {
            return Err(QueueError::Malformed("truncated entry body".into()));
        }
        out.push(blob[offset..offset + len].to_vec());
        offset += len;
    }
    Ok(out)
}

/// Writes to a recipient's outbox. Each key gets its own `Mutex<u32>`, the
/// `u32` being the monotonic `seq` that slot needs locally (the DHT only
/// accepts a strictly-increasing `seq` at a signed key). Holding that lock
/// across the whole fetch-modify-replace sequence, not just the counter
/// bump, is what matters: two concurrent appends to the same recipient that
/// only serialized the counter would still both read the same pre-append
/// blob and race to `put_signed`, with the losing envelope silently dropped.
pub struct OutboxWriter {
    dht: Arc<DhtClient>,
    locks: DashMap<DhtKey, Arc<Mutex<u32>>>,
}

impl OutboxWriter {
    pub fn new(dht: Arc<DhtClient>) -> Self {
        Self { dht, locks: DashMap::new() }
    }

    fn lock_for(&self, key: DhtKey) -> Arc<Mutex<u32>> {
        self.locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(0))).clone()
    }

    /// Append `envelope` to `recipient`'s outbox. Caller fragments oversized
    /// application messages before calling; exceeding the 50 KB slot here is
    /// rejected rather than silently truncated.
    pub async fn append(&self, recipient: &Fingerprint, envelope: Vec<u8>) -> Result<()> {
        let key = outbox_key(recipient);
        let lock = self.lock_for(key);
        let mut seq = lock.lock().await;

        let mut entries = match self.dht.get(&key).await {
            Some(blob) => parse_entries(&blob)?,
            None => Vec::new(),
        };
        entries.push(envelope);
        let blob = frame_entries(&entries);
        if blob.len() > OUTBOX_CAPACITY_BYTES {
            return Err(QueueError::Capacity { size: blob.len() });
        }

        *seq += 1;
        self.dht.put_signed(key, blob, OUTBOX_VALUE_ID, *seq, ValueType::SevenDay).await;
        Ok(())
    }

    /// Clear `owner`'s own outbox after its contents have been durably
    /// persisted locally. All-or-nothing: there is no partial clear.
    pub async fn clear(&self, owner: &Fingerprint) {
        let key = outbox_key(owner);
        let lock = self.lock_for(key);
        let mut seq = lock.lock().await;
        *seq += 1;
        self.dht.put_signed(key, frame_entries(&[]), OUTBOX_VALUE_ID, *seq, ValueType::SevenDay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_parse_roundtrips_empty_and_nonempty() {
        assert_eq!(parse_entries(&frame_entries(&[])).unwrap(), Vec::<Vec<u8>>::new());
        let entries = vec![b"one".to_vec(), b"two".to_vec()];
        assert_eq!(parse_entries(&frame_entries(&entries)).unwrap(), entries);
    }

    #[test]
    fn truncated_blob_is_malformed() {
        let blob = frame_entries(&[b"hello".to_vec()]);
        assert!(matches!(parse_entries(&blob[..blob.len() - 2]), Err(QueueError::Malformed(_))));
    }

    #[tokio::test]
    async fn append_then_fetch_roundtrips_through_the_dht() {
        let dht = DhtClient::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let writer = OutboxWriter::new(dht.clone());
        let recipient = [5u8; 64];

        writer.append(&recipient, b"envelope-1".to_vec()).await.unwrap();
        writer.append(&recipient, b"envelope-2".to_vec()).await.unwrap();

        let blob = dht.get(&outbox_key(&recipient)).await.unwrap();
        let entries = parse_entries(&blob).unwrap();
        assert_eq!(entries, vec![b"envelope-1".to_vec(), b"envelope-2".to_vec()]);
    }

    #[tokio::test]
    async fn clear_replaces_with_an_empty_queue() {
        let dht = DhtClient::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let writer = OutboxWriter::new(dht.clone());
        let owner = [6u8; 64];

        writer.append(&owner, b"envelope".to_vec()).await.unwrap();
        writer.clear(&owner).await;

        let blob = dht.get(&outbox_key(&owner)).await.unwrap();
        assert!(parse_entries(&blob).unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_append_is_rejected() {
        let dht = DhtClient::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let writer = OutboxWriter::new(dht);
        let recipient = [7u8; 64];
        let huge = vec![0u8; OUTBOX_CAPACITY_BYTES + 1];
        assert!(matches!(writer.append(&recipient, huge).await, Err(QueueError::Capacity { .. })));
    }
}
