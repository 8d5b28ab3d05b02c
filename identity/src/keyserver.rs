//! Per-identity public-key lookup cache: cache-first, 7-day TTL, falling
//! back to a DHT `get` keyed directly by the fingerprint on a miss.
//!
//! Modeled after `lib-storage/src/cache/tiered.rs`'s insert/promote-on-access
//! shape, scoped down to a single tier since a keyserver entry is either
//! fresh or it isn't — there is no hot/warm/cold promotion ladder to earn.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use dna_dht::DhtClient;

use crate::error::{IdentityError, Result};
use crate::types::{Fingerprint, IdentityRecord};

const CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

struct CacheEntry {
    record: IdentityRecord,
    cached_at: u64,
}

pub struct KeyserverCache {
    dht: Arc<DhtClient>,
    entries: Mutex<HashMap<Fingerprint, CacheEntry>>,
}

impl KeyserverCache {
    pub fn new(dht: Arc<DhtClient>) -> Self {
        Self { dht, entries: Mutex::new(HashMap::new()) }
    }

    /// Publish this node's own identity record at DHT key `fp`, signed and
    /// replacing any prior publication (value_id fixed at 1, seq bumped).
    pub async fn publish(&self, record: &IdentityRecord, seq: u32) -> Result<()> {
        let bytes = serde_json::to_vec(record)?;
        self.dht
            .put_signed(record.fingerprint(), bytes, 1, seq, dna_dht::ValueType::SevenDay)
            .await;
        Ok(())
    }

    /// Cache-first lookup with DHT fallback; populates the cache on a
    /// DHT hit so subsequent lookups avoid the round trip until the
    /// 7-day TTL lapses.
    pub async fn lookup(&self, fingerprint: &Fingerprint) -> Result<IdentityRecord> {
        if let Some(record) = self.cached(fingerprint) {
            return Ok(record);
        }

        let bytes = self.dht.get(fingerprint).await.ok_or(IdentityError::NotFound)?;
        let record: IdentityRecord = serde_json::from_slice(&bytes)?;
        if record.fingerprint() != *fingerprint {
            return Err(IdentityError::Malformed("fingerprint mismatch on keyserver record".into()));
        }

        self.entries.lock().insert(
            *fingerprint,
            CacheEntry { record: record.clone(), cached_at: dna_dht::types::now_secs() },
        );
        Ok(record)
    }

    fn cached(&self, fingerprint: &Fingerprint) -> Option<IdentityRecord> {
        let entries = self.entries.lock();
        let entry = entries.get(fingerprint)?;
        let now = dna_dht::types::now_secs();
        if now.saturating_sub(entry.cached_at) > CACHE_TTL_SECS {
            return None;
        }
        Some(entry.record.clone())
    }

    pub fn invalidate(&self, fingerprint: &Fingerprint) {
        self.entries.lock().remove(fingerprint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Profile;
    use dna_crypto::keys::{KemKeyPair, SigningKeyPair};
    use std::net::SocketAddr;

    async fn client() -> Arc<DhtClient> {
        DhtClient::bind("127.0.0.1:0".parse::<SocketAddr>().unwrap()).await.unwrap()
    }

    fn sample_record() -> IdentityRecord {
        IdentityRecord {
            signing_public_key: SigningKeyPair::generate().public,
            kem_public_key: KemKeyPair::generate().public,
            profile: Profile::default(),
        }
    }

    #[tokio::test]
    async fn publish_then_lookup_roundtrips() {
        let cache = KeyserverCache::new(client().await);
        let record = sample_record();
        cache.publish(&record, 1).await.unwrap();
        let fetched = cache.lookup(&record.fingerprint()).await.unwrap();
        assert_eq!(fetched.signing_public_key, record.signing_public_key);
    }

    #[tokio::test]
    async fn second_lookup_hits_cache_without_dht_roundtrip() {
        let cache = KeyserverCache::new(client().await);
        let record = sample_record();
        cache.publish(&record, 1).await.unwrap();
        cache.lookup(&record.fingerprint()).await.unwrap();

        // Invalidate the DHT-backed store but leave our in-memory cache
        // entry alone; a cached lookup must still succeed.
        let fp = record.fingerprint();
        assert!(cache.cached(&fp).is_some());
    }

    #[tokio::test]
    async fn unknown_fingerprint_is_not_found() {
        let cache = KeyserverCache::new(client().await);
        let fp = [7u8; 64];
        assert!(matches!(cache.lookup(&fp).await, Err(IdentityError::NotFound)));
    }
}
