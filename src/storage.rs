//! Storage: the key/value transport beneath datasets.
//!
//! A store maps [`StoreKey`]s to opaque byte values.
//! Datasets place their catalog documents and encoded chunks in a store, and never interpret store errors: they propagate unchanged as [`ErrorKind::Io`](crate::ErrorKind::Io).
//!
//! This module defines the storage traits, an in-memory [`MemoryStore`], and two storage adapters which wrap any store:
//!  - [`UsageLogStorageAdapter`] logs every storage call with the [`log`] crate, and
//!  - [`PerformanceMetricsStorageAdapter`] counts reads, writes, and bytes transferred.

mod memory_store;
mod performance_metrics;
mod store_key;
mod usage_log;

use std::sync::Arc;

use thiserror::Error;

use crate::{
    node::{NodeNameError, NodePath, NodePathError},
    ErrorKind,
};

pub use self::memory_store::MemoryStore;
pub use self::performance_metrics::PerformanceMetricsStorageAdapter;
pub use self::store_key::{StoreKey, StoreKeyError, StoreKeys, StorePrefix};
pub use self::usage_log::UsageLogStorageAdapter;

/// Bytes stored at a key.
pub type Bytes = Vec<u8>;

/// Bytes stored at a key, or [`None`] if the key does not exist.
pub type MaybeBytes = Option<Bytes>;

/// Readable storage traits.
pub trait ReadableStorageTraits: Send + Sync {
    /// Retrieve the value (bytes) associated with a given [`StoreKey`].
    ///
    /// Returns [`None`] if the key is not found.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError>;

    /// Return the size in bytes of the value at `key`.
    ///
    /// Returns [`None`] if the key is not found.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        Ok(self.get(key)?.map(|bytes| bytes.len() as u64))
    }
}

/// Writable storage traits.
pub trait WritableStorageTraits: Send + Sync {
    /// Store bytes at a [`StoreKey`].
    ///
    /// # Errors
    /// Returns a [`StorageError`] on failure to store.
    fn set(&self, key: &StoreKey, value: Bytes) -> Result<(), StorageError>;

    /// Erase a [`StoreKey`]. Erasing a missing key succeeds.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn erase(&self, key: &StoreKey) -> Result<(), StorageError>;

    /// Erase a list of [`StoreKey`].
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn erase_values(&self, keys: &[StoreKey]) -> Result<(), StorageError> {
        keys.iter().try_for_each(|key| self.erase(key))
    }
}

/// Listable storage traits.
pub trait ListableStorageTraits: Send + Sync {
    /// Retrieve all [`StoreKeys`] with a given [`StorePrefix`], in lexicographical order.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying error with the store.
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError>;
}

/// A supertrait of [`ReadableStorageTraits`], [`WritableStorageTraits`], and [`ListableStorageTraits`].
pub trait ReadableWritableListableStorageTraits:
    ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits
{
}

impl<T> ReadableWritableListableStorageTraits for T where
    T: ?Sized + ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits
{
}

/// [`Arc`] wrapped readable, writable, and listable storage.
pub type ReadableWritableListableStorage = Arc<dyn ReadableWritableListableStorageTraits>;

/// A storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// An error parsing the metadata for a key.
    #[error("error parsing metadata for {0}: {1}")]
    InvalidMetadata(StoreKey, String),
    /// An invalid store key.
    #[error("invalid store key {0}")]
    InvalidStoreKey(#[from] StoreKeyError),
    /// An invalid node path.
    #[error("invalid node path {0}")]
    NodePathError(#[from] NodePathError),
    /// An invalid node name.
    #[error("invalid node name {0}")]
    NodeNameError(#[from] NodeNameError),
    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl StorageError {
    /// Returns the [`ErrorKind`] of the error.
    ///
    /// Invalid paths and names are [`ErrorKind::Value`], everything else is [`ErrorKind::Io`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidStoreKey(_) | Self::NodePathError(_) | Self::NodeNameError(_) => {
                ErrorKind::Value
            }
            Self::IOError(_) | Self::InvalidMetadata(..) | Self::Other(_) => ErrorKind::Io,
        }
    }
}

impl From<&str> for StorageError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for StorageError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}

/// Return the key prefix of a node, without a trailing `/`. The root node has an empty prefix.
fn node_prefix(path: &NodePath) -> &str {
    path.as_str().trim_start_matches('/')
}

fn node_key(path: &NodePath, name: &str) -> StoreKey {
    let prefix = node_prefix(path);
    let key = if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    };
    StoreKey::new_unchecked(key)
}

/// Return the key of the dataset metadata document of the node at `path`.
#[must_use]
pub fn dataset_metadata_key(path: &NodePath) -> StoreKey {
    node_key(path, ".dataset")
}

/// Return the key of the group metadata document of the node at `path`.
#[must_use]
pub fn group_metadata_key(path: &NodePath) -> StoreKey {
    node_key(path, ".group")
}

/// Return the key of the chunk at `chunk_indices` of the dataset at `path`.
///
/// Chunk keys are `<path>/c/<i>/<j>/...`, and `<path>/c` for zero-dimensional datasets.
#[must_use]
pub fn chunk_key(path: &NodePath, chunk_indices: &[u64]) -> StoreKey {
    let mut key = node_key(path, "c").as_str().to_string();
    for index in chunk_indices {
        key.push('/');
        key.push_str(&index.to_string());
    }
    StoreKey::new_unchecked(key)
}

/// Return the prefix of all chunk keys of the dataset at `path`.
#[must_use]
pub fn chunk_prefix(path: &NodePath) -> StorePrefix {
    StorePrefix::new_unchecked(format!("{}/", node_key(path, "c").as_str()))
}

/// Parse the chunk indices from a key under [`chunk_prefix`].
///
/// Returns [`None`] if `key` is not a chunk key of a dataset with `dimensionality`.
#[must_use]
pub fn chunk_indices_from_key(
    prefix: &StorePrefix,
    key: &StoreKey,
    dimensionality: usize,
) -> Option<Vec<u64>> {
    let indices = key
        .as_str()
        .strip_prefix(prefix.as_str())?
        .split('/')
        .map(|index| index.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    (indices.len() == dimensionality).then_some(indices)
}
