//! Embedded persistence (spec.md §6): `contacts`, `messages`, `groups`,
//! `dht_group_gsks`, `keyserver_cache`, `identity_profile`, `presence_cache`.
//!
//! A single `rusqlite::Connection` behind a `parking_lot::Mutex` — this is a
//! single-process P2P client, not a server fielding concurrent connection
//! pools, so one guarded connection is enough (see SPEC_FULL.md's rationale
//! for picking `rusqlite` over `sqlx` here).

use std::path::Path;
use std::sync::Arc;

use dna_gsk::{GskEntry, GskStore, Group};
use dna_identity::{Contact, Fingerprint, IdentityRecord};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Arc<Self>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Arc::new(Self { conn: Arc::new(Mutex::new(conn)) }))
    }

    pub fn open_in_memory() -> Result<Arc<Self>> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Arc::new(Self { conn: Arc::new(Mutex::new(conn)) }))
    }

    // -- contacts --------------------------------------------------------

    pub fn save_contact(&self, contact: &Contact) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO contacts (fingerprint, signing_public_key, kem_public_key, name, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(fingerprint) DO UPDATE SET last_seen = excluded.last_seen",
            params![
                contact.fingerprint.to_vec(),
                &contact.signing_public_key,
                &contact.kem_public_key,
                &contact.name,
                contact.last_seen as i64,
            ],
        )?;
        Ok(())
    }

    pub fn load_contacts(&self) -> Result<Vec<Contact>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT fingerprint, signing_public_key, kem_public_key, name, last_seen FROM contacts")?;
        let rows = stmt.query_map([], |row| {
            let fp_bytes: Vec<u8> = row.get(0)?;
            Ok(Contact {
                fingerprint: fingerprint_from_vec(fp_bytes),
                signing_public_key: row.get(1)?,
                kem_public_key: row.get(2)?,
                name: row.get(3)?,
                last_seen: row.get::<_, i64>(4)? as u64,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    // -- messages ---------------------------------------------------------

    pub fn save_message(&self, peer: &Fingerprint, outgoing: bool, plaintext: &[u8], timestamp: u64) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO messages (peer_fingerprint, direction, plaintext, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![peer.to_vec(), if outgoing { "out" } else { "in" }, plaintext, timestamp as i64],
        )?;
        Ok(())
    }

    pub fn load_messages(&self, peer: &Fingerprint) -> Result<Vec<(bool, Vec<u8>, u64)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT direction, plaintext, timestamp FROM messages WHERE peer_fingerprint = ?1 ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map(params![peer.to_vec()], |row| {
            let direction: String = row.get(0)?;
            Ok((direction == "out", row.get(1)?, row.get::<_, i64>(2)? as u64))
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    // -- keyserver cache ---------------------------------------------------

    pub fn save_keyserver_record(&self, record: &IdentityRecord, cached_at: u64) -> Result<()> {
        let json = serde_json::to_vec(record).expect("IdentityRecord always serializes");
        self.conn.lock().execute(
            "INSERT INTO keyserver_cache (fingerprint, record_json, cached_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(fingerprint) DO UPDATE SET record_json = excluded.record_json, cached_at = excluded.cached_at",
            params![record.fingerprint().to_vec(), json, cached_at as i64],
        )?;
        Ok(())
    }

    pub fn load_keyserver_record(&self, fp: &Fingerprint) -> Result<Option<(IdentityRecord, u64)>> {
        let conn = self.conn.lock();
        let row: Option<(Vec<u8>, i64)> = conn
            .query_row(
                "SELECT record_json, cached_at FROM keyserver_cache WHERE fingerprint = ?1",
                params![fp.to_vec()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(match row {
            Some((json, cached_at)) => Some((serde_json::from_slice(&json)?, cached_at as u64)),
            None => None,
        })
    }

    // -- presence cache -----------------------------------------------------

    pub fn save_presence(&self, fp: &Fingerprint, last_seen: u64) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO presence_cache (fingerprint, last_seen) VALUES (?1, ?2)
             ON CONFLICT(fingerprint) DO UPDATE SET last_seen = excluded.last_seen",
            params![fp.to_vec(), last_seen as i64],
        )?;
        Ok(())
    }

    // -- local identity -----------------------------------------------------

    /// Persist the one local identity this node runs as. There is at most
    /// one row: a fresh identity replaces whatever was there before.
    pub fn save_identity(&self, identity: &dna_identity::Identity) -> Result<()> {
        let profile_json = serde_json::to_vec(&identity.profile)?;
        let conn = self.conn.lock();
        conn.execute("DELETE FROM identity_profile", [])?;
        conn.execute(
            "INSERT INTO identity_profile
                (fingerprint, signing_public_key, signing_secret_key, kem_public_key, kem_secret_key, profile_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                identity.fingerprint.to_vec(),
                &identity.signing.public,
                &identity.signing.secret.0,
                &identity.kem.public,
                &identity.kem.secret.0,
                profile_json,
            ],
        )?;
        Ok(())
    }

    pub fn load_identity(&self) -> Result<Option<dna_identity::Identity>> {
        use dna_crypto::keys::{KemKeyPair, KemSecretKey, SigningKeyPair, SigningSecretKey};

        let conn = self.conn.lock();
        let row: Option<(Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>)> = conn
            .query_row(
                "SELECT fingerprint, signing_public_key, signing_secret_key, kem_public_key, kem_secret_key
                 FROM identity_profile LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?;
        let Some((fp_bytes, signing_pub, signing_sec, kem_pub, kem_sec)) = row else { return Ok(None) };
        let profile_json: Vec<u8> =
            conn.query_row("SELECT profile_json FROM identity_profile LIMIT 1", [], |row| row.get(0))?;
        drop(conn);

        Ok(Some(dna_identity::Identity {
            fingerprint: fingerprint_from_vec(fp_bytes),
            signing: SigningKeyPair { public: signing_pub, secret: SigningSecretKey(signing_sec) },
            kem: KemKeyPair { public: kem_pub, secret: KemSecretKey(kem_sec) },
            profile: serde_json::from_slice(&profile_json)?,
        }))
    }
}

fn fingerprint_from_vec(bytes: Vec<u8>) -> Fingerprint {
    bytes.try_into().unwrap_or([0u8; 64])
}

/// `dna-gsk`'s durable `GskStore` implementation: `groups` and
/// `dht_group_gsks`, the two tables spec.md §6 names for local GSK state.
impl GskStore for SqliteStore {
    fn save_entry(&self, entry: GskEntry) {
        let _ = self.conn.lock().execute(
            "INSERT INTO dht_group_gsks (group_uuid, gsk_version, gsk, created_at, expires_at) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(group_uuid, gsk_version) DO UPDATE SET gsk = excluded.gsk",
            params![entry.group_uuid, entry.version, entry.key.to_vec(), entry.created_at as i64, entry.expires_at as i64],
        );
    }

    fn load_entry(&self, group_uuid: &str, version: u32) -> Option<GskEntry> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT gsk, created_at, expires_at FROM dht_group_gsks WHERE group_uuid = ?1 AND gsk_version = ?2",
            params![group_uuid, version],
            |row| {
                let key: Vec<u8> = row.get(0)?;
                Ok(GskEntry {
                    group_uuid: group_uuid.to_string(),
                    version,
                    key: key.try_into().unwrap_or([0u8; 32]),
                    created_at: row.get::<_, i64>(1)? as u64,
                    expires_at: row.get::<_, i64>(2)? as u64,
                })
            },
        )
        .optional()
        .ok()
        .flatten()
    }

    fn latest_entry(&self, group_uuid: &str) -> Option<GskEntry> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT gsk_version, gsk, created_at, expires_at FROM dht_group_gsks
             WHERE group_uuid = ?1 ORDER BY gsk_version DESC LIMIT 1",
            params![group_uuid],
            |row| {
                let key: Vec<u8> = row.get(1)?;
                Ok(GskEntry {
                    group_uuid: group_uuid.to_string(),
                    version: row.get(0)?,
                    key: key.try_into().unwrap_or([0u8; 32]),
                    created_at: row.get::<_, i64>(2)? as u64,
                    expires_at: row.get::<_, i64>(3)? as u64,
                })
            },
        )
        .optional()
        .ok()
        .flatten()
    }

    fn save_group(&self, group: Group) {
        let Ok(json) = serde_json::to_vec(&group) else { return };
        let _ = self.conn.lock().execute(
            "INSERT INTO groups (uuid, group_json) VALUES (?1, ?2)
             ON CONFLICT(uuid) DO UPDATE SET group_json = excluded.group_json",
            params![group.uuid, json],
        );
    }

    fn load_group(&self, uuid: &str) -> Option<Group> {
        let conn = self.conn.lock();
        let json: Option<Vec<u8>> = conn
            .query_row("SELECT group_json FROM groups WHERE uuid = ?1", params![uuid], |row| row.get(0))
            .optional()
            .ok()
            .flatten();
        json.and_then(|j| serde_json::from_slice(&j).ok())
    }

    fn all_groups(&self) -> Vec<Group> {
        let conn = self.conn.lock();
        let Ok(mut stmt) = conn.prepare("SELECT group_json FROM groups") else { return Vec::new() };
        let Ok(rows) = stmt.query_map([], |row| row.get::<_, Vec<u8>>(0)) else { return Vec::new() };
        rows.filter_map(|r| r.ok()).filter_map(|j| serde_json::from_slice(&j).ok()).collect()
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS contacts (
    fingerprint BLOB PRIMARY KEY,
    signing_public_key BLOB NOT NULL,
    kem_public_key BLOB NOT NULL,
    name TEXT,
    last_seen INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    peer_fingerprint BLOB NOT NULL,
    direction TEXT NOT NULL,
    plaintext BLOB NOT NULL,
    timestamp INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_peer ON messages (peer_fingerprint, timestamp);

CREATE TABLE IF NOT EXISTS groups (
    uuid TEXT PRIMARY KEY,
    group_json BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS dht_group_gsks (
    group_uuid TEXT NOT NULL,
    gsk_version INTEGER NOT NULL,
    gsk BLOB NOT NULL,
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL,
    PRIMARY KEY (group_uuid, gsk_version)
);

CREATE TABLE IF NOT EXISTS keyserver_cache (
    fingerprint BLOB PRIMARY KEY,
    record_json BLOB NOT NULL,
    cached_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS identity_profile (
    fingerprint BLOB PRIMARY KEY,
    signing_public_key BLOB NOT NULL,
    signing_secret_key BLOB NOT NULL,
    kem_public_key BLOB NOT NULL,
    kem_secret_key BLOB NOT NULL,
    profile_json BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS presence_cache (
    fingerprint BLOB PRIMARY KEY,
    last_seen INTEGER NOT NULL
);
";

#[cfg(test)]
mod tests {
    use super::*;
    use dna_crypto::keys::{KemKeyPair, SigningKeyPair};
    use dna_identity::types::Profile;

    fn sample_record() -> IdentityRecord {
        IdentityRecord {
            signing_public_key: SigningKeyPair::generate().public,
            kem_public_key: KemKeyPair::generate().public,
            profile: Profile::default(),
        }
    }

    #[test]
    fn contact_roundtrips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = sample_record();
        let contact = Contact::from_record(record, Some("Ada".into()), 1000);
        store.save_contact(&contact).unwrap();
        let loaded = store.load_contacts().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name.as_deref(), Some("Ada"));
    }

    #[test]
    fn identity_roundtrips_and_a_fresh_one_replaces_it() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.load_identity().unwrap().is_none());

        let first = dna_identity::Identity::generate(Profile::default());
        store.save_identity(&first).unwrap();
        let loaded = store.load_identity().unwrap().unwrap();
        assert_eq!(loaded.fingerprint, first.fingerprint);
        assert_eq!(loaded.signing.public, first.signing.public);

        let second = dna_identity::Identity::generate(Profile::default());
        store.save_identity(&second).unwrap();
        let loaded = store.load_identity().unwrap().unwrap();
        assert_eq!(loaded.fingerprint, second.fingerprint);
    }

    #[test]
    fn messages_are_ordered_by_timestamp() {
        let store = SqliteStore::open_in_memory().unwrap();
        let peer = [1u8; 64];
        store.save_message(&peer, true, b"second", 200).unwrap();
        store.save_message(&peer, false, b"first", 100).unwrap();
        let loaded = store.load_messages(&peer).unwrap();
        assert_eq!(loaded[0].1, b"first");
        assert_eq!(loaded[1].1, b"second");
    }

    #[test]
    fn gsk_store_latest_entry_picks_highest_version() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.save_entry(GskEntry::new("g1".into(), 0, [1u8; 32], 10));
        store.save_entry(GskEntry::new("g1".into(), 1, [2u8; 32], 20));
        let latest = store.latest_entry("g1").unwrap();
        assert_eq!(latest.version, 1);
        assert_eq!(latest.key, [2u8; 32]);
    }

    #[test]
    fn group_roundtrips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let group = Group::new("g1".into(), "name".into(), "desc".into(), [3u8; 64], 1000);
        store.save_group(group.clone());
        let loaded = store.load_group("g1").unwrap();
        assert_eq!(loaded.name, "name");
        assert_eq!(store.all_groups().len(), 1);
    }

    #[test]
    fn keyserver_cache_roundtrips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = sample_record();
        store.save_keyserver_record(&record, 500).unwrap();
        let (loaded, cached_at) = store.load_keyserver_record(&record.fingerprint()).unwrap().unwrap();
        assert_eq!(loaded.signing_public_key, record.signing_public_key);
        assert_eq!(cached_at, 500);
    }
}
