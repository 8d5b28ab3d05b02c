//! GSK manager: group creation, on-demand GSK fetch, rotation, and the
//! background discovery poll described in spec.md §4.3.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use dna_crypto::keys::{KemKeyPair, SigningKeyPair};
use dna_crypto::random::random_key32;
use dna_dht::{types::now_secs, DhtClient, ValueType};
use dna_identity::{presence, Fingerprint, IdentityRecord, KeyserverCache};

use crate::election;
use crate::error::{GskError, Result};
use crate::ikp;
use crate::store::GskStore;
use crate::types::{GskEntry, Group};

pub struct GskManager {
    dht: Arc<DhtClient>,
    keyserver: Arc<KeyserverCache>,
    store: Arc<dyn GskStore>,
    my_fingerprint: Fingerprint,
    signing_key: SigningKeyPair,
    kem_key: KemKeyPair,
}

impl GskManager {
    pub fn new(
        dht: Arc<DhtClient>,
        keyserver: Arc<KeyserverCache>,
        store: Arc<dyn GskStore>,
        my_fingerprint: Fingerprint,
        signing_key: SigningKeyPair,
        kem_key: KemKeyPair,
    ) -> Self {
        Self { dht, keyserver, store, my_fingerprint, signing_key, kem_key }
    }

    fn group_metadata_key(uuid: &str) -> dna_dht::DhtKey {
        dna_crypto::sha3_512(uuid.as_bytes())
    }

    /// Step 1: generate a fresh GSK, fetch each member's KEM key (cache
    /// first), build and publish the IKP, publish group metadata.
    pub async fn create_group(&self, name: String, description: String) -> Result<Group> {
        let now = now_secs();
        let mut group = Group::new(Uuid::new_v4().to_string(), name, description, self.my_fingerprint, now);
        let gsk = random_key32();
        self.publish_ikp(&group, &gsk).await?;
        self.store.save_entry(GskEntry::new(group.uuid.clone(), group.gsk_version, gsk, now));
        self.publish_group_metadata(&group).await;
        self.store.save_group(group.clone());
        Ok(group)
    }

    async fn resolve_member_kem_keys(&self, members: &[Fingerprint]) -> Result<Vec<(Fingerprint, Vec<u8>)>> {
        let mut out = Vec::with_capacity(members.len());
        for fp in members {
            let record: IdentityRecord = self.keyserver.lookup(fp).await?;
            out.push((*fp, record.kem_public_key));
        }
        Ok(out)
    }

    async fn publish_ikp(&self, group: &Group, gsk: &[u8; 32]) -> Result<()> {
        let member_keys = self.resolve_member_kem_keys(&group.members).await?;
        let packet = ikp::build(&group.uuid, group.gsk_version, gsk, &member_keys, &self.signing_key)?;
        self.dht
            .chunked_store(group.uuid.as_bytes(), group.gsk_version, &packet, ValueType::SevenDay)
            .await;
        Ok(())
    }

    async fn publish_group_metadata(&self, group: &Group) {
        let Ok(bytes) = serde_json::to_vec(group) else { return };
        self.dht
            .put_signed(Self::group_metadata_key(&group.uuid), bytes, 1, group.version, ValueType::SevenDay)
            .await;
    }

    /// Fetch the current group metadata from the DHT, falling back to the
    /// locally stored copy on a miss.
    pub async fn refresh_group_metadata(&self, uuid: &str) -> Option<Group> {
        if let Some(bytes) = self.dht.get(&Self::group_metadata_key(uuid)).await {
            if let Ok(group) = serde_json::from_slice::<Group>(&bytes) {
                self.store.save_group(group.clone());
                return Some(group);
            }
        }
        self.store.load_group(uuid)
    }

    /// Step 2: load the active GSK, fetching and installing on a cache miss.
    pub async fn active_gsk(&self, group: &Group) -> Result<[u8; 32]> {
        if let Some(entry) = self.store.latest_entry(&group.uuid) {
            if entry.version == group.gsk_version && !entry.is_expired(now_secs()) {
                return Ok(entry.key);
            }
        }
        self.fetch_and_install(group).await
    }

    /// On-demand fetch: chunked-fetch the IKP for `group.gsk_version`,
    /// verify it, and recover this member's GSK.
    pub async fn fetch_and_install(&self, group: &Group) -> Result<[u8; 32]> {
        let owner_record = self.keyserver.lookup(&group.current_owner).await?;
        let Some(packet) = self.dht.chunked_fetch(group.uuid.as_bytes(), group.gsk_version).await? else {
            return Err(GskError::NotFound);
        };

        let parsed = ikp::parse(&packet, &owner_record.signing_public_key)?;
        let entry = ikp::find_own_entry(&parsed, &self.my_fingerprint).ok_or(GskError::NotAMember)?;
        let gsk = ikp::recover_gsk(entry, &self.kem_key.secret.0)?;

        let stored = GskEntry::new(group.uuid.clone(), parsed.version, gsk, now_secs());
        self.store.save_entry(stored);
        Ok(gsk)
    }

    /// Step 3: rotation. Only the elected owner should call this in
    /// practice; callers are expected to have already confirmed ownership
    /// via [`Self::maybe_transfer_ownership`].
    pub async fn rotate(&self, group: &mut Group) -> Result<()> {
        group.gsk_version += 1;
        group.version += 1;
        group.updated_at = now_secs();
        let gsk = random_key32();
        self.publish_ikp(group, &gsk).await?;
        self.store.save_entry(GskEntry::new(group.uuid.clone(), group.gsk_version, gsk, now_secs()));
        self.publish_group_metadata(group).await;
        self.store.save_group(group.clone());
        info!(group = %group.uuid, version = group.gsk_version, "rotated gsk");
        Ok(())
    }

    /// Step 4: background discovery for one cached group — compares the
    /// DHT's `gsk_version` against the local copy and installs on mismatch.
    pub async fn discover_one(&self, uuid: &str) {
        let Some(remote) = self.refresh_group_metadata(uuid).await else { return };
        let local_version = self.store.load_group(uuid).map(|g| g.gsk_version);
        if local_version != Some(remote.gsk_version) {
            debug!(group = uuid, remote = remote.gsk_version, local = ?local_version, "gsk version mismatch");
            if let Err(e) = self.fetch_and_install(&remote).await {
                warn!(group = uuid, error = %e, "gsk discovery fetch failed");
            }
        }
    }

    /// Runs discovery for every group this node tracks. Intended to be
    /// invoked by the core crate's ~2-minute background poller.
    pub async fn discover_all(&self) {
        for group in self.store.all_groups() {
            self.discover_one(&group.uuid).await;
        }
    }

    /// Presence-based election (spec.md §4.3): if the current owner has
    /// gone stale, deterministically pick a new one among live members.
    /// Returns `Some(new_owner)` only when a transfer actually occurred and
    /// this node is that new owner, so the caller knows to call `rotate`.
    pub async fn maybe_transfer_ownership(&self, group: &mut Group) -> Result<bool> {
        let owner_last_seen = presence::last_seen(&self.dht, &group.current_owner).await?;
        if !election::ownership_stale(owner_last_seen, now_secs()) {
            return Ok(false);
        }

        let mut last_seen_cache = std::collections::HashMap::new();
        for fp in &group.members {
            if let Ok(Some(seen)) = presence::last_seen(&self.dht, fp).await {
                last_seen_cache.insert(*fp, seen);
            }
        }
        let Some(new_owner) = election::elect_owner(&group.members, |fp| last_seen_cache.get(fp).copied(), now_secs())
        else {
            return Ok(false);
        };

        group.current_owner = new_owner;
        group.updated_at = now_secs();
        self.store.save_group(group.clone());

        if new_owner == self.my_fingerprint {
            self.rotate(group).await?;
            return Ok(true);
        }
        self.publish_group_metadata(group).await;
        Ok(false)
    }
}
