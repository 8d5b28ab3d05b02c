//! Bridges `dna-gsk`'s string-keyed `GskStore` to the `group_uuid: &Uuid`
//! contract `dna-codec::decode` needs, without giving `dna-codec` a
//! dependency on `dna-gsk`.

use std::sync::Arc;

use dna_gsk::GskStore;

pub struct CoreGskLookup {
    store: Arc<dyn GskStore>,
}

impl CoreGskLookup {
    pub fn new(store: Arc<dyn GskStore>) -> Self {
        Self { store }
    }
}

impl dna_codec::GskLookup for CoreGskLookup {
    fn lookup(&self, group_uuid: &uuid::Uuid, gsk_version: u32) -> Option<[u8; 32]> {
        self.store.load_entry(&group_uuid.to_string(), gsk_version).map(|entry| entry.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dna_codec::GskLookup;
    use dna_gsk::GskEntry;

    #[test]
    fn looks_up_an_installed_entry_by_stringified_uuid() {
        let store: Arc<dyn GskStore> = crate::store::SqliteStore::open_in_memory().unwrap();
        let uuid = uuid::Uuid::new_v4();
        store.save_entry(GskEntry::new(uuid.to_string(), 3, [9u8; 32], 1000));

        let lookup = CoreGskLookup::new(store);
        assert_eq!(lookup.lookup(&uuid, 3), Some([9u8; 32]));
        assert_eq!(lookup.lookup(&uuid, 4), None);
    }
}
