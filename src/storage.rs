use std::collections::BTreeMap;

/// Key-value backing store for state snapshots. Implementations only need
/// whole-blob reads and writes; layout within the blob is the caller's
/// business.
pub trait StorageAdapter {
    fn read_state(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn write_state(&mut self, key: Vec<u8>, value: Vec<u8>);
}

#[derive(Default)]
pub struct InMemoryStorage {
    pub kv: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl StorageAdapter for InMemoryStorage {
    fn read_state(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.kv.get(key).cloned()
    }

    fn write_state(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.kv.insert(key, value);
    }
}
