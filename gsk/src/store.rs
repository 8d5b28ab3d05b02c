//! Local GSK/group persistence contract. `dna-core` provides the durable
//! (SQL) implementation; this in-memory one backs unit tests.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::types::{GskEntry, Group};

pub trait GskStore: Send + Sync {
    fn save_entry(&self, entry: GskEntry);
    fn load_entry(&self, group_uuid: &str, version: u32) -> Option<GskEntry>;
    /// Highest-version entry known locally for this group.
    fn latest_entry(&self, group_uuid: &str) -> Option<GskEntry>;
    fn save_group(&self, group: Group);
    fn load_group(&self, uuid: &str) -> Option<Group>;
    fn all_groups(&self) -> Vec<Group>;
}

#[derive(Default)]
pub struct InMemoryGskStore {
    entries: RwLock<HashMap<(String, u32), GskEntry>>,
    groups: RwLock<HashMap<String, Group>>,
}

impl InMemoryGskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GskStore for InMemoryGskStore {
    fn save_entry(&self, entry: GskEntry) {
        self.entries.write().insert((entry.group_uuid.clone(), entry.version), entry);
    }

    fn load_entry(&self, group_uuid: &str, version: u32) -> Option<GskEntry> {
        self.entries.read().get(&(group_uuid.to_string(), version)).cloned()
    }

    fn latest_entry(&self, group_uuid: &str) -> Option<GskEntry> {
        self.entries
            .read()
            .values()
            .filter(|e| e.group_uuid == group_uuid)
            .max_by_key(|e| e.version)
            .cloned()
    }

    fn save_group(&self, group: Group) {
        self.groups.write().insert(group.uuid.clone(), group);
    }

    fn load_group(&self, uuid: &str) -> Option<Group> {
        self.groups.read().get(uuid).cloned()
    }

    fn all_groups(&self) -> Vec<Group> {
        self.groups.read().values().cloned().collect()
    }
}
