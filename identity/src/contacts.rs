//! In-memory contact book. Durable storage (the `contacts` table) lives in
//! `dna-core`'s embedded store; this is the runtime view the rest of the
//! process reads and mutates, refreshed from persistence at startup.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::types::{Contact, Fingerprint, IdentityRecord};

#[derive(Default)]
pub struct ContactBook {
    contacts: RwLock<HashMap<Fingerprint, Contact>>,
}

impl ContactBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create-on-first-interaction: insert only if absent, per spec.md §3.
    pub fn observe(&self, record: IdentityRecord, name: Option<String>, seen_at: u64) {
        let fp = record.fingerprint();
        let mut contacts = self.contacts.write();
        contacts
            .entry(fp)
            .and_modify(|c| c.last_seen = seen_at)
            .or_insert_with(|| Contact::from_record(record, name, seen_at));
    }

    /// Presence-lookup mutation: bump `last_seen` without touching cached keys.
    pub fn touch_presence(&self, fingerprint: &Fingerprint, seen_at: u64) {
        if let Some(contact) = self.contacts.write().get_mut(fingerprint) {
            contact.last_seen = seen_at;
        }
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Contact> {
        self.contacts.read().get(fingerprint).cloned()
    }

    pub fn all(&self) -> Vec<Contact> {
        self.contacts.read().values().cloned().collect()
    }
}
