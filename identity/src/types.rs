//! Identity, contact, and public-record types.
//!
//! Grounded on `lib-identity/src/types/identity_types.rs`, collapsed to the
//! single unified identity model spec.md §9 adopts — no separate citizen/
//! visitor/organization identity types, no private recovery-phrase fields.

use dna_crypto::keys::{KemKeyPair, SigningKeyPair};
use serde::{Deserialize, Serialize};

/// 64-byte SHA3-512 fingerprint of an identity's signing public key.
pub type Fingerprint = [u8; 64];

pub fn fingerprint_of(signing_public_key: &[u8]) -> Fingerprint {
    dna_crypto::hashing::sha3_512(signing_public_key)
}

pub fn fingerprint_hex(fp: &Fingerprint) -> String {
    hex::encode(fp)
}

/// A local identity: the full keypairs plus the same profile fields that are
/// published to the keyserver.
pub struct Identity {
    pub fingerprint: Fingerprint,
    pub signing: SigningKeyPair,
    pub kem: KemKeyPair,
    pub profile: Profile,
}

impl Identity {
    pub fn generate(profile: Profile) -> Self {
        let signing = SigningKeyPair::generate();
        let kem = KemKeyPair::generate();
        let fingerprint = fingerprint_of(&signing.public);
        Self { fingerprint, signing, kem, profile }
    }

    pub fn record(&self) -> IdentityRecord {
        IdentityRecord {
            signing_public_key: self.signing.public.clone(),
            kem_public_key: self.kem.public.clone(),
            profile: self.profile.clone(),
        }
    }
}

/// Unified profile fields carried on every published identity record.
/// Spec.md §9 open question on "unified identity model" resolves in favor of
/// a single record type with these fields all optional except the two
/// timestamps, rather than separate citizen/organization/device schemas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    pub display_name: Option<String>,
    pub avatar_hash: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

/// The record published to the DHT at key `fp` (no extra hashing — the
/// fingerprint itself is already a 64-byte hash and is used directly as the
/// DHT key, per spec.md §6's named-key table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub signing_public_key: Vec<u8>,
    pub kem_public_key: Vec<u8>,
    pub profile: Profile,
}

impl IdentityRecord {
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint_of(&self.signing_public_key)
    }
}

/// A cached contact: created on first interaction, mutated by presence
/// lookups, never automatically destroyed (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub fingerprint: Fingerprint,
    pub signing_public_key: Vec<u8>,
    pub kem_public_key: Vec<u8>,
    pub name: Option<String>,
    pub last_seen: u64,
}

impl Contact {
    pub fn from_record(record: IdentityRecord, name: Option<String>, last_seen: u64) -> Self {
        Self {
            fingerprint: record.fingerprint(),
            signing_public_key: record.signing_public_key,
            kem_public_key: record.kem_public_key,
            name,
            last_seen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_64_bytes_of_signing_key_hash() {
        let identity = Identity::generate(Profile::default());
        assert_eq!(identity.fingerprint.len(), 64);
        assert_eq!(identity.fingerprint, fingerprint_of(&identity.signing.public));
    }

    #[test]
    fn fingerprint_hex_is_128_chars() {
        let identity = Identity::generate(Profile::default());
        assert_eq!(fingerprint_hex(&identity.fingerprint).len(), 128);
    }

    #[test]
    fn record_roundtrips_through_json() {
        let identity = Identity::generate(Profile {
            display_name: Some("Ada".into()),
            ..Default::default()
        });
        let record = identity.record();
        let bytes = serde_json::to_vec(&record).unwrap();
        let parsed: IdentityRecord = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.fingerprint(), identity.fingerprint);
        assert_eq!(parsed.profile.display_name.as_deref(), Some("Ada"));
    }
}
