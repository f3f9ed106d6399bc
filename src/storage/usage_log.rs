//! A storage adapter which logs storage calls.

use std::sync::Arc;

use log::{log, Level};

use super::{
    Bytes, ListableStorageTraits, MaybeBytes, ReadableStorageTraits, StorageError, StoreKey,
    StoreKeys, StorePrefix, WritableStorageTraits,
};

/// The usage log storage adapter. Logs storage method calls through the [`log`] crate.
///
/// It is intended to aid in debugging and optimising performance by revealing storage access patterns.
///
/// ### Example
/// ```rust
/// # use std::sync::Arc;
/// # use ndstore::storage::{MemoryStore, UsageLogStorageAdapter};
/// let store = Arc::new(MemoryStore::new());
/// let store = Arc::new(UsageLogStorageAdapter::new(store, log::Level::Info));
/// ```
///
/// With a logger installed, dataset operations then produce records like:
/// ```text
/// set(temperature/c/1, len=140) -> Ok(())
/// get(temperature/c/0) -> len=Ok(Some(140))
/// list_prefix(temperature/c/) -> Ok(2)
/// ```
#[derive(Debug)]
pub struct UsageLogStorageAdapter<TStorage: ?Sized> {
    storage: Arc<TStorage>,
    level: Level,
}

impl<TStorage: ?Sized> UsageLogStorageAdapter<TStorage> {
    /// Create a new usage log storage adapter logging calls to `storage` at `level`.
    #[must_use]
    pub fn new(storage: Arc<TStorage>, level: Level) -> Self {
        Self { storage, level }
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits> ReadableStorageTraits
    for UsageLogStorageAdapter<TStorage>
{
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        let result = self.storage.get(key);
        log!(
            self.level,
            "get({key}) -> len={:?}",
            result.as_ref().map(|v| v.as_ref().map(Bytes::len))
        );
        result
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        let result = self.storage.size_key(key);
        log!(self.level, "size_key({key}) -> {result:?}");
        result
    }
}

impl<TStorage: ?Sized + WritableStorageTraits> WritableStorageTraits
    for UsageLogStorageAdapter<TStorage>
{
    fn set(&self, key: &StoreKey, value: Bytes) -> Result<(), StorageError> {
        let len = value.len();
        let result = self.storage.set(key, value);
        log!(self.level, "set({key}, len={len}) -> {result:?}");
        result
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        let result = self.storage.erase(key);
        log!(self.level, "erase({key}) -> {result:?}");
        result
    }

    fn erase_values(&self, keys: &[StoreKey]) -> Result<(), StorageError> {
        let result = self.storage.erase_values(keys);
        log!(self.level, "erase_values({} keys) -> {result:?}", keys.len());
        result
    }
}

impl<TStorage: ?Sized + ListableStorageTraits> ListableStorageTraits
    for UsageLogStorageAdapter<TStorage>
{
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        let result = self.storage.list_prefix(prefix);
        log!(
            self.level,
            "list_prefix({prefix}) -> {:?}",
            result.as_ref().map(Vec::len)
        );
        result
    }
}
