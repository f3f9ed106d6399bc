//! An in-memory store.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{
    Bytes, ListableStorageTraits, MaybeBytes, ReadableStorageTraits, StorageError, StoreKey,
    StoreKeys, StorePrefix, WritableStorageTraits,
};

/// An in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data_map: RwLock<BTreeMap<StoreKey, Bytes>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of keys in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data_map.read().len()
    }

    /// Returns true if the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data_map.read().is_empty()
    }
}

impl ReadableStorageTraits for MemoryStore {
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        Ok(self.data_map.read().get(key).cloned())
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        Ok(self
            .data_map
            .read()
            .get(key)
            .map(|value| value.len() as u64))
    }
}

impl WritableStorageTraits for MemoryStore {
    fn set(&self, key: &StoreKey, value: Bytes) -> Result<(), StorageError> {
        self.data_map.write().insert(key.clone(), value);
        Ok(())
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.data_map.write().remove(key);
        Ok(())
    }

    fn erase_values(&self, keys: &[StoreKey]) -> Result<(), StorageError> {
        let mut data_map = self.data_map.write();
        for key in keys {
            data_map.remove(key);
        }
        Ok(())
    }
}

impl ListableStorageTraits for MemoryStore {
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        Ok(self
            .data_map
            .read()
            .keys()
            .filter(|key| key.has_prefix(prefix))
            .cloned()
            .collect())
    }
}
