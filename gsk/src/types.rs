//! Group metadata and locally stored GSK entries (spec.md §3).

use serde::{Deserialize, Serialize};

use dna_identity::Fingerprint;

pub const GSK_LIFETIME_SECS: u64 = 7 * 24 * 60 * 60;

/// A group's mutable, metadata-only state (published to the DHT as JSON at
/// key `group_uuid`). `version` tracks metadata revisions; `gsk_version`
/// tracks which IKP is current — the two counters are independent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub uuid: String,
    pub name: String,
    pub description: String,
    pub creator_fingerprint: Fingerprint,
    pub members: Vec<Fingerprint>,
    pub version: u32,
    pub gsk_version: u32,
    pub created_at: u64,
    pub updated_at: u64,
    /// Local bookkeeping, not part of spec.md's named Group fields: who is
    /// currently responsible for rotating and re-signing this group. Starts
    /// as the creator and moves under the liveness-election rule in §4.3.
    pub current_owner: Fingerprint,
}

impl Group {
    pub fn new(uuid: String, name: String, description: String, creator_fingerprint: Fingerprint, now: u64) -> Self {
        Self {
            uuid,
            name,
            description,
            members: vec![creator_fingerprint],
            creator_fingerprint,
            version: 0,
            gsk_version: 0,
            created_at: now,
            updated_at: now,
            current_owner: creator_fingerprint,
        }
    }

    pub fn is_member(&self, fp: &Fingerprint) -> bool {
        self.members.contains(fp)
    }
}

/// A locally stored Group Session Key. Primary key is `(group_uuid, version)`.
/// Kept past `expires_at` to decrypt historical messages, per local
/// retention policy (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GskEntry {
    pub group_uuid: String,
    pub version: u32,
    pub key: [u8; 32],
    pub created_at: u64,
    pub expires_at: u64,
}

impl GskEntry {
    pub fn new(group_uuid: String, version: u32, key: [u8; 32], created_at: u64) -> Self {
        Self { group_uuid, version, key, created_at, expires_at: created_at + GSK_LIFETIME_SECS }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now > self.expires_at
    }
}
