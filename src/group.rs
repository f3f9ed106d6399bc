//! Groups.
//!
//! A [`Group`] is a node which hosts datasets and child groups in a store.
//! Every group has a metadata document at `<path>/.group`, and every dataset has one at `<path>/.dataset` (see [`DatasetMetadata`](crate::dataset::DatasetMetadata)).
//!
//! Open dataset handles are shared per store: every group opened on the same [`ReadableWritableListableStorage`] returns the identical [`Arc<Dataset>`] for a dataset while that handle is alive, so [`Group::require_dataset`] is idempotent and concurrent writers share chunk locks.
//! Separate `Arc`s wrapping distinct stores never share handles, even if they address the same underlying data.

mod group_metadata;

use std::{
    collections::HashMap,
    sync::{Arc, OnceLock, Weak},
};

use log::debug;
use parking_lot::Mutex;
use thiserror::Error;

use crate::{
    data_type::DataType,
    dataset::{Dataset, DatasetBuilder, DatasetCreateError},
    node::{NodeName, NodeNameError, NodePath, NodePathError},
    storage::{
        dataset_metadata_key, group_metadata_key, ReadableWritableListableStorage,
        ReadableWritableListableStorageTraits, StorageError,
    },
    ArrayShape, ErrorKind,
};

pub use self::group_metadata::{GroupMetadata, GROUP_FORMAT_VERSION};

type DatasetHandles = Arc<Mutex<HashMap<NodePath, Weak<Dataset>>>>;

/// Returns the dataset handles shared by every group of `storage`.
fn store_handles(storage: &ReadableWritableListableStorage) -> DatasetHandles {
    type StoreHandles = (Weak<dyn ReadableWritableListableStorageTraits>, DatasetHandles);
    static STORES: OnceLock<Mutex<HashMap<usize, StoreHandles>>> = OnceLock::new();
    let mut stores = STORES.get_or_init(Mutex::default).lock();
    // entries of dropped stores could alias a new store at the same address
    stores.retain(|_, (store, _)| store.strong_count() > 0);
    let address = Arc::as_ptr(storage).cast::<()>() as usize;
    stores
        .entry(address)
        .or_insert_with(|| (Arc::downgrade(storage), DatasetHandles::default()))
        .1
        .clone()
}

/// A group.
#[derive(Clone)]
pub struct Group {
    storage: ReadableWritableListableStorage,
    path: NodePath,
    handles: DatasetHandles,
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// A group error.
#[derive(Debug, Error)]
pub enum GroupError {
    /// An invalid node path.
    #[error(transparent)]
    NodePathError(#[from] NodePathError),
    /// An invalid node name.
    #[error(transparent)]
    NodeNameError(#[from] NodeNameError),
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// A dataset creation error.
    #[error(transparent)]
    DatasetCreateError(#[from] DatasetCreateError),
    /// A node already exists at the path.
    #[error("a node already exists at {0}")]
    AlreadyExists(NodePath),
    /// There is no node at the path.
    #[error("no node exists at {0}")]
    NotFound(NodePath),
    /// The node at the path is a group, not a dataset.
    #[error("{0} is a group, not a dataset")]
    NotADataset(NodePath),
    /// The node at the path is a dataset, not a group.
    #[error("{0} is a dataset, not a group")]
    NotAGroup(NodePath),
    /// An unsupported group metadata format version.
    #[error("unsupported group format version {0}")]
    InvalidFormatVersion(u32),
    /// An existing dataset which is incompatible with a requested shape or data type.
    #[error("existing dataset {path} is incompatible: {reason}")]
    Incompatible {
        /// The path of the dataset.
        path: NodePath,
        /// The reason.
        reason: String,
    },
}

impl GroupError {
    /// Returns the [`ErrorKind`] of the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NodePathError(err) => err.kind(),
            Self::NodeNameError(err) => err.kind(),
            Self::StorageError(err) => err.kind(),
            Self::DatasetCreateError(err) => err.kind(),
            Self::AlreadyExists(_) | Self::NotFound(_) | Self::InvalidFormatVersion(_) => {
                ErrorKind::Value
            }
            Self::NotADataset(_) | Self::NotAGroup(_) | Self::Incompatible { .. } => {
                ErrorKind::Type
            }
        }
    }
}

/// The kind of node at a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NodeKind {
    Group,
    Dataset,
}

impl Group {
    /// Open the root group of `storage`, creating it if the store has no root group.
    ///
    /// # Errors
    /// Returns a [`GroupError`] if there is an underlying store error or the root metadata is invalid.
    pub fn new(storage: ReadableWritableListableStorage) -> Result<Self, GroupError> {
        let path = NodePath::root();
        if storage.get(&group_metadata_key(&path))?.is_none() {
            write_group_metadata(&storage, &path)?;
            debug!("created root group");
        }
        Self::open(storage, path.as_str())
    }

    /// Open the existing group at `path` of `storage`.
    ///
    /// # Errors
    /// Returns a [`GroupError`] if `path` is invalid, there is no group at `path`, or its metadata is invalid.
    pub fn open(storage: ReadableWritableListableStorage, path: &str) -> Result<Self, GroupError> {
        let path = NodePath::new(path)?;
        read_group_metadata(&storage, &path)?;
        let handles = store_handles(&storage);
        Ok(Self {
            storage,
            path,
            handles,
        })
    }

    /// Returns the node path of the group.
    #[must_use]
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    fn child_path(&self, name: &str) -> Result<NodePath, GroupError> {
        Ok(self.path.child(&NodeName::new(name)?))
    }

    fn node_kind(&self, path: &NodePath) -> Result<Option<NodeKind>, StorageError> {
        if self.storage.size_key(&dataset_metadata_key(path))?.is_some() {
            Ok(Some(NodeKind::Dataset))
        } else if self.storage.size_key(&group_metadata_key(path))?.is_some() {
            Ok(Some(NodeKind::Group))
        } else {
            Ok(None)
        }
    }

    /// Returns true if the group has a child node `name`.
    ///
    /// # Errors
    /// Returns a [`GroupError`] if `name` is invalid or there is an underlying store error.
    pub fn contains(&self, name: &str) -> Result<bool, GroupError> {
        let path = self.child_path(name)?;
        Ok(self.node_kind(&path)?.is_some())
    }

    /// Create the child group `name`.
    ///
    /// # Errors
    /// Returns a [`GroupError`] if `name` is invalid, a node `name` already exists, or there is an underlying store error.
    pub fn create_group(&self, name: &str) -> Result<Self, GroupError> {
        let path = self.child_path(name)?;
        if self.node_kind(&path)?.is_some() {
            return Err(GroupError::AlreadyExists(path));
        }
        write_group_metadata(&self.storage, &path)?;
        debug!("created group {path}");
        Ok(Self {
            storage: self.storage.clone(),
            path,
            handles: self.handles.clone(),
        })
    }

    /// Open the child group `name`.
    ///
    /// # Errors
    /// Returns a [`GroupError`] if `name` is invalid, there is no group `name`, or there is an underlying store error.
    pub fn group(&self, name: &str) -> Result<Self, GroupError> {
        let path = self.child_path(name)?;
        match self.node_kind(&path)? {
            Some(NodeKind::Group) => {
                read_group_metadata(&self.storage, &path)?;
                Ok(Self {
                    storage: self.storage.clone(),
                    path,
                    handles: self.handles.clone(),
                })
            }
            Some(NodeKind::Dataset) => Err(GroupError::NotAGroup(path)),
            None => Err(GroupError::NotFound(path)),
        }
    }

    /// Create the child dataset `name` from `builder`, storing its metadata and any initial data.
    ///
    /// # Errors
    /// Returns a [`GroupError`] if `name` is invalid, a node `name` already exists, or the dataset cannot be created.
    pub fn create_dataset(
        &self,
        name: &str,
        builder: &DatasetBuilder,
    ) -> Result<Arc<Dataset>, GroupError> {
        let path = self.child_path(name)?;
        let mut handles = self.handles.lock();
        if self.node_kind(&path)?.is_some() {
            return Err(GroupError::AlreadyExists(path));
        }
        let dataset = Arc::new(builder.build_and_store(self.storage.clone(), path.as_str())?);
        handles.insert(path, Arc::downgrade(&dataset));
        Ok(dataset)
    }

    /// Create the child dataset `name` with the shape, maximum shape, data type, chunk layout, fill value, and filters of `other`.
    ///
    /// The data of `other` is not copied.
    ///
    /// # Errors
    /// Returns a [`GroupError`] if `name` is invalid, a node `name` already exists, or there is an underlying store error.
    pub fn create_dataset_like(
        &self,
        name: &str,
        other: &Dataset,
    ) -> Result<Arc<Dataset>, GroupError> {
        let path = self.child_path(name)?;
        let mut handles = self.handles.lock();
        if self.node_kind(&path)?.is_some() {
            return Err(GroupError::AlreadyExists(path));
        }
        let dataset = Arc::new(other.new_like(self.storage.clone(), path.clone()));
        dataset.store_metadata()?;
        debug!("created dataset {path} like {}", other.path());
        handles.insert(path, Arc::downgrade(&dataset));
        Ok(dataset)
    }

    /// Open the child dataset `name`.
    ///
    /// Returns the shared handle if the dataset is already open.
    ///
    /// # Errors
    /// Returns a [`GroupError`] if `name` is invalid, there is no node `name` ([`ErrorKind::Value`]), the node is a group ([`ErrorKind::Type`]), or the metadata is invalid.
    pub fn dataset(&self, name: &str) -> Result<Arc<Dataset>, GroupError> {
        let path = self.child_path(name)?;
        let mut handles = self.handles.lock();
        self.open_dataset(&mut handles, path)
    }

    fn open_dataset(
        &self,
        handles: &mut HashMap<NodePath, Weak<Dataset>>,
        path: NodePath,
    ) -> Result<Arc<Dataset>, GroupError> {
        if let Some(dataset) = handles.get(&path).and_then(Weak::upgrade) {
            return Ok(dataset);
        }
        match self.node_kind(&path)? {
            Some(NodeKind::Dataset) => {
                let dataset = Arc::new(Dataset::open(self.storage.clone(), path.as_str())?);
                handles.insert(path, Arc::downgrade(&dataset));
                Ok(dataset)
            }
            Some(NodeKind::Group) => Err(GroupError::NotADataset(path)),
            None => Err(GroupError::NotFound(path)),
        }
    }

    /// Open the child dataset `name` if it is compatible, otherwise create it with `shape` and `data_type`.
    ///
    /// An existing dataset is compatible if its shape is `shape` and
    ///  - `exact` is true and its data type is `data_type`, or
    ///  - `exact` is false and its data type can losslessly represent `data_type`.
    ///
    /// Repeated calls return the identical handle.
    ///
    /// # Errors
    /// Returns a [`GroupError`] with [`ErrorKind::Type`] if the existing node is a group or an incompatible dataset.
    /// Also returns an error if `name` is invalid, the dataset cannot be created, or there is an underlying store error.
    pub fn require_dataset(
        &self,
        name: &str,
        shape: ArrayShape,
        data_type: &DataType,
        exact: bool,
    ) -> Result<Arc<Dataset>, GroupError> {
        let path = self.child_path(name)?;
        let mut handles = self.handles.lock();
        if self.node_kind(&path)?.is_none() {
            let dataset = DatasetBuilder::new()
                .shape(shape)
                .data_type(data_type.clone())
                .build_and_store(self.storage.clone(), path.as_str())?;
            debug!("required dataset {path} was created");
            let dataset = Arc::new(dataset);
            handles.insert(path, Arc::downgrade(&dataset));
            return Ok(dataset);
        }

        let dataset = self.open_dataset(&mut handles, path.clone())?;
        let incompatible = |reason: String| GroupError::Incompatible {
            path: path.clone(),
            reason,
        };
        if dataset.shape().as_ref() != Some(&shape) {
            return Err(incompatible(format!(
                "shape {:?} does not match the requested shape {shape:?}",
                dataset.shape()
            )));
        }
        let existing = dataset.data_type();
        let compatible = if exact {
            existing == data_type
        } else {
            existing.can_losslessly_represent(data_type)
        };
        if !compatible {
            return Err(incompatible(format!(
                "data type {existing} is not compatible with the requested data type {data_type}"
            )));
        }
        Ok(dataset)
    }
}

fn read_group_metadata(
    storage: &ReadableWritableListableStorage,
    path: &NodePath,
) -> Result<GroupMetadata, GroupError> {
    let key = group_metadata_key(path);
    let Some(bytes) = storage.get(&key)? else {
        return if storage.size_key(&dataset_metadata_key(path))?.is_some() {
            Err(GroupError::NotAGroup(path.clone()))
        } else {
            Err(GroupError::NotFound(path.clone()))
        };
    };
    let metadata: GroupMetadata = serde_json::from_slice(&bytes)
        .map_err(|err| StorageError::InvalidMetadata(key, err.to_string()))?;
    if metadata.validate_format() {
        Ok(metadata)
    } else {
        Err(GroupError::InvalidFormatVersion(metadata.format_version))
    }
}

fn write_group_metadata(
    storage: &ReadableWritableListableStorage,
    path: &NodePath,
) -> Result<(), StorageError> {
    let key = group_metadata_key(path);
    let bytes = serde_json::to_vec_pretty(&GroupMetadata::default())
        .map_err(|err| StorageError::InvalidMetadata(key.clone(), err.to_string()))?;
    storage.set(&key, bytes)
}
