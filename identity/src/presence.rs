//! Presence records: `(fingerprint -> last_seen_unix_seconds)`, published as
//! a signed, 7-day TTL value at `SHA3-512(fingerprint || ":presence")`
//! (spec.md §3, §6). Used by the GSK manager's ownership-liveness check and
//! by contacts to refresh `last_seen`.

use std::sync::Arc;

use dna_dht::{DhtClient, DhtKey, ValueType};

use crate::error::Result;
use crate::types::Fingerprint;

pub fn presence_key(fingerprint: &Fingerprint) -> DhtKey {
    let mut buf = fingerprint.to_vec();
    buf.extend_from_slice(b":presence");
    dna_crypto::sha3_512(&buf)
}

pub struct PresencePublisher {
    dht: Arc<DhtClient>,
    fingerprint: Fingerprint,
}

impl PresencePublisher {
    pub fn new(dht: Arc<DhtClient>, fingerprint: Fingerprint) -> Self {
        Self { dht, fingerprint }
    }

    /// Publish the current timestamp, replacing the previous publication.
    ///
    /// `seq` is the timestamp itself (truncated to `u32`) rather than an
    /// in-memory counter: a counter starting back at zero on every process
    /// restart would never out-rank a higher `seq` a prior run already
    /// published, silently wedging presence for the rest of that record's
    /// 7-day TTL. Wall-clock seconds only ever increase.
    pub async fn publish_now(&mut self) {
        let now = dna_dht::types::now_secs();
        self.dht
            .put_signed(presence_key(&self.fingerprint), now.to_be_bytes().to_vec(), 1, now as u32, ValueType::SevenDay)
            .await;
    }
}

/// Read a peer's last-seen timestamp, if a non-expired presence record exists.
pub async fn last_seen(dht: &DhtClient, fingerprint: &Fingerprint) -> Result<Option<u64>> {
    let Some(bytes) = dht.get(&presence_key(fingerprint)).await else {
        return Ok(None);
    };
    let arr: [u8; 8] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| crate::error::IdentityError::Malformed("presence record is not 8 bytes".into()))?;
    Ok(Some(u64::from_be_bytes(arr)))
}

/// Whether a member is considered live (seen within the last 7 days), per
/// the ownership-transfer rule in spec.md §4.3.
pub fn is_live(last_seen_secs: u64, now: u64) -> bool {
    now.saturating_sub(last_seen_secs) <= 7 * 24 * 60 * 60
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    #[tokio::test]
    async fn publish_then_read_roundtrips() {
        let client = DhtClient::bind("127.0.0.1:0".parse::<SocketAddr>().unwrap()).await.unwrap();
        let fp = [1u8; 64];
        let mut publisher = PresencePublisher::new(client.clone(), fp);
        publisher.publish_now().await;
        let seen = last_seen(&client, &fp).await.unwrap();
        assert!(seen.is_some());
    }

    #[test]
    fn liveness_boundary_is_seven_days() {
        let now = 1_000_000u64;
        assert!(is_live(now - 7 * 24 * 60 * 60, now));
        assert!(!is_live(now - 7 * 24 * 60 * 60 - 1, now));
    }
}
