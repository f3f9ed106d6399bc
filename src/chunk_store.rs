//! Chunk storage.
//!
//! A [`ChunkStore`] moves the chunks of one dataset between element buffers and a store.
//! Encoding a chunk serializes its elements, runs them through the dataset [`FilterPipeline`], and sets the result at the chunk key.
//! Chunks which have never been written decode as the fill value.
//!
//! Serialized chunk layout:
//!  - fixed-size types: the packed little-endian elements, and
//!  - variable-length types: `n` references of [`VLEN_REFERENCE_SIZE`] bytes (`u64` heap offset and `u64` length, little-endian), followed by the heap.
//!
//! Writes to one chunk are serialized by a per-chunk lock, so concurrent partial writes to the same chunk do not lose updates.

use std::{collections::HashMap, sync::Arc};

use log::trace;
use parking_lot::Mutex;
use thiserror::Error;

use crate::{
    array_bytes::{ArrayBytes, ElementBuffer},
    chunk_grid::RegularChunkGrid,
    data_type::{DataType, FillValue, VLEN_REFERENCE_SIZE},
    filter::{CodecOptions, FilterError, FilterPipeline},
    node::NodePath,
    num_elements,
    storage::{
        chunk_indices_from_key, chunk_key, chunk_prefix, ReadableWritableListableStorage,
        StorageError, StoreKey,
    },
    to_usize, ArrayIndices, ErrorKind,
};

/// A chunk store error.
#[derive(Debug, Error)]
pub enum ChunkStoreError {
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// A filter error.
    #[error(transparent)]
    FilterError(#[from] FilterError),
    /// A decoded chunk which is inconsistent with the dataset.
    #[error("invalid chunk {key}: {reason}")]
    InvalidChunk {
        /// The chunk key.
        key: StoreKey,
        /// The reason the chunk is invalid.
        reason: String,
    },
}

impl ChunkStoreError {
    /// Returns the [`ErrorKind`] of the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StorageError(err) => err.kind(),
            Self::FilterError(err) => err.kind(),
            Self::InvalidChunk { .. } => ErrorKind::Io,
        }
    }
}

/// A table of per-chunk write locks.
#[derive(Debug, Default)]
struct ChunkLocks {
    locks: Mutex<HashMap<ArrayIndices, Arc<Mutex<()>>>>,
}

impl ChunkLocks {
    fn lock(&self, chunk_indices: &[u64]) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(chunk_indices.to_vec())
            .or_default()
            .clone()
    }
}

/// The chunks of one dataset in a store.
pub struct ChunkStore {
    storage: ReadableWritableListableStorage,
    path: NodePath,
    data_type: DataType,
    fill_value: FillValue,
    pipeline: FilterPipeline,
    chunk_grid: RegularChunkGrid,
    locks: ChunkLocks,
}

impl std::fmt::Debug for ChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStore")
            .field("path", &self.path)
            .field("data_type", &self.data_type)
            .field("pipeline", &self.pipeline)
            .field("chunk_grid", &self.chunk_grid)
            .finish_non_exhaustive()
    }
}

impl ChunkStore {
    /// Create a chunk store for the dataset at `path`.
    #[must_use]
    pub fn new(
        storage: ReadableWritableListableStorage,
        path: NodePath,
        data_type: DataType,
        fill_value: FillValue,
        pipeline: FilterPipeline,
        chunk_grid: RegularChunkGrid,
    ) -> Self {
        Self {
            storage,
            path,
            data_type,
            fill_value,
            pipeline,
            chunk_grid,
            locks: ChunkLocks::default(),
        }
    }

    /// Return the chunk grid.
    #[must_use]
    pub fn chunk_grid(&self) -> &RegularChunkGrid {
        &self.chunk_grid
    }

    /// Return the data type of the stored elements.
    #[must_use]
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Return the fill value.
    #[must_use]
    pub fn fill_value(&self) -> &FillValue {
        &self.fill_value
    }

    /// Return the filter pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &FilterPipeline {
        &self.pipeline
    }

    /// Return the key of the chunk at `chunk_indices`.
    #[must_use]
    pub fn chunk_key(&self, chunk_indices: &[u64]) -> StoreKey {
        chunk_key(&self.path, chunk_indices)
    }

    fn chunk_num_elements(&self) -> usize {
        to_usize(num_elements(self.chunk_grid.chunk_shape()))
    }

    /// Retrieve and decode the chunk at `chunk_indices`.
    ///
    /// A chunk which is not in the store is synthesized from the fill value.
    ///
    /// # Errors
    /// Returns a [`ChunkStoreError`] if the store fails, a filter fails to decode, or the decoded chunk is invalid.
    pub fn retrieve_chunk(
        &self,
        chunk_indices: &[u64],
        options: &CodecOptions,
    ) -> Result<ArrayBytes, ChunkStoreError> {
        let key = self.chunk_key(chunk_indices);
        let num_elements = self.chunk_num_elements();
        let Some(encoded) = self.storage.get(&key)? else {
            trace!("chunk {key} is not stored, using the fill value");
            return Ok(ArrayBytes::new_fill_value(
                &self.data_type,
                num_elements,
                &self.fill_value,
            ));
        };
        let decoded = self
            .pipeline
            .decode(encoded, self.data_type.stored_size(), options)?;
        deserialize_chunk(decoded, &self.data_type, num_elements)
            .map_err(|reason| ChunkStoreError::InvalidChunk { key, reason })
    }

    /// Retrieve the chunk at `chunk_indices` as an element buffer.
    ///
    /// # Errors
    /// See [`ChunkStore::retrieve_chunk`].
    pub(crate) fn retrieve_chunk_buffer(
        &self,
        chunk_indices: &[u64],
        options: &CodecOptions,
    ) -> Result<ElementBuffer, ChunkStoreError> {
        let bytes = self.retrieve_chunk(chunk_indices, options)?;
        Ok(ElementBuffer::from_array_bytes(bytes, &self.data_type))
    }

    /// Encode and store the chunk at `chunk_indices`.
    ///
    /// `bytes` must hold every element of the chunk.
    ///
    /// # Errors
    /// Returns a [`ChunkStoreError`] if a filter fails to encode or the store fails.
    pub fn store_chunk(
        &self,
        chunk_indices: &[u64],
        bytes: ArrayBytes,
        options: &CodecOptions,
    ) -> Result<(), ChunkStoreError> {
        let key = self.chunk_key(chunk_indices);
        let serialized = serialize_chunk(bytes);
        let encoded = self
            .pipeline
            .encode(serialized, self.data_type.stored_size(), options)?;
        self.storage.set(&key, encoded)?;
        Ok(())
    }

    /// Update part of the chunk at `chunk_indices` under its write lock.
    ///
    /// The chunk is read, passed to `update`, and stored.
    /// If `whole_chunk` is true every element is overwritten by `update`, so the stored chunk is not read.
    ///
    /// # Errors
    /// Returns a [`ChunkStoreError`] if the chunk cannot be retrieved or stored.
    pub(crate) fn update_chunk(
        &self,
        chunk_indices: &[u64],
        whole_chunk: bool,
        options: &CodecOptions,
        update: impl FnOnce(&mut ElementBuffer),
    ) -> Result<(), ChunkStoreError> {
        let lock = self.locks.lock(chunk_indices);
        let _guard = lock.lock();
        let mut buffer = if whole_chunk {
            ElementBuffer::new_fill_value(
                &self.data_type,
                self.chunk_num_elements(),
                &self.fill_value,
            )
        } else {
            self.retrieve_chunk_buffer(chunk_indices, options)?
        };
        update(&mut buffer);
        self.store_chunk(chunk_indices, buffer.into_array_bytes(), options)
    }

    /// Erase the chunks at `chunk_indices`.
    ///
    /// # Errors
    /// Returns a [`ChunkStoreError`] if the store fails.
    pub fn erase_chunks(&self, chunk_indices: &[ArrayIndices]) -> Result<(), ChunkStoreError> {
        let keys: Vec<StoreKey> = chunk_indices
            .iter()
            .map(|indices| self.chunk_key(indices))
            .collect();
        self.storage.erase_values(&keys)?;
        Ok(())
    }

    /// Return the indices of every chunk in the store.
    ///
    /// # Errors
    /// Returns a [`ChunkStoreError`] if the store fails to list keys.
    pub fn stored_chunks(&self) -> Result<Vec<ArrayIndices>, ChunkStoreError> {
        let dimensionality = self.chunk_grid.dimensionality();
        if dimensionality == 0 {
            let key = self.chunk_key(&[]);
            return Ok(if self.storage.size_key(&key)?.is_some() {
                vec![vec![]]
            } else {
                vec![]
            });
        }
        let prefix = chunk_prefix(&self.path);
        Ok(self
            .storage
            .list_prefix(&prefix)?
            .iter()
            .filter_map(|key| chunk_indices_from_key(&prefix, key, dimensionality))
            .collect())
    }
}

/// Serialize chunk elements into their stored byte layout.
fn serialize_chunk(bytes: ArrayBytes) -> Vec<u8> {
    match bytes {
        ArrayBytes::Fixed(bytes) => bytes,
        ArrayBytes::Variable(heap, offsets) => {
            let num_elements = offsets.len().saturating_sub(1);
            let mut serialized = Vec::with_capacity(num_elements * VLEN_REFERENCE_SIZE + heap.len());
            for w in offsets.windows(2) {
                serialized.extend_from_slice(&(w[0] as u64).to_le_bytes());
                serialized.extend_from_slice(&((w[1] - w[0]) as u64).to_le_bytes());
            }
            serialized.extend_from_slice(&heap);
            serialized
        }
    }
}

/// Deserialize stored chunk bytes holding `num_elements` elements of `data_type`.
fn deserialize_chunk(
    bytes: Vec<u8>,
    data_type: &DataType,
    num_elements: usize,
) -> Result<ArrayBytes, String> {
    if let Some(size) = data_type.fixed_size() {
        return if bytes.len() == num_elements * size {
            Ok(ArrayBytes::Fixed(bytes))
        } else {
            Err(format!(
                "expected {} bytes, got {}",
                num_elements * size,
                bytes.len()
            ))
        };
    }

    let references_size = num_elements * VLEN_REFERENCE_SIZE;
    if bytes.len() < references_size {
        return Err(format!(
            "expected at least {references_size} bytes of references, got {}",
            bytes.len()
        ));
    }
    let (references, heap) = bytes.split_at(references_size);
    let mut elements = Vec::with_capacity(heap.len());
    let mut offsets = Vec::with_capacity(num_elements + 1);
    offsets.push(0);
    for reference in references.chunks_exact(VLEN_REFERENCE_SIZE) {
        let (offset, length) = reference.split_at(8);
        let offset = u64::from_le_bytes(offset.try_into().unwrap_or_default());
        let length = u64::from_le_bytes(length.try_into().unwrap_or_default());
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= heap.len() as u64)
            .ok_or_else(|| format!("reference {offset}+{length} exceeds the heap"))?;
        elements.extend_from_slice(&heap[to_usize(offset)..to_usize(end)]);
        offsets.push(elements.len());
    }
    Ok(ArrayBytes::Variable(elements, offsets))
}

#[cfg(test)]
mod tests {
    use crate::{
        data_type::{Charset, Value},
        filter::{FilterRequest, FilterTable},
        storage::{MemoryStore, ReadableStorageTraits, WritableStorageTraits},
    };

    use super::*;

    fn chunk_store(
        data_type: DataType,
        fill_value: FillValue,
        request: &FilterRequest,
    ) -> (Arc<MemoryStore>, ChunkStore) {
        let store = Arc::new(MemoryStore::new());
        let pipeline = FilterPipeline::new(request, &data_type, &FilterTable::default()).unwrap();
        let chunk_store = ChunkStore::new(
            store.clone(),
            NodePath::new("/data").unwrap(),
            data_type,
            fill_value,
            pipeline,
            RegularChunkGrid::new(vec![2, 2]),
        );
        (store, chunk_store)
    }

    #[test]
    fn chunk_store_fill_value() {
        let data_type = DataType::int32();
        let fill_value = FillValue::from_value(&Value::Int(7), &data_type).unwrap();
        let (store, chunk_store) = chunk_store(data_type, fill_value, &FilterRequest::default());
        let options = CodecOptions::default();
        let bytes = chunk_store.retrieve_chunk(&[0, 0], &options).unwrap();
        assert_eq!(bytes, ArrayBytes::Fixed([7, 0, 0, 0].repeat(4)));
        assert!(store.is_empty());
    }

    #[test]
    fn chunk_store_store_retrieve_erase() {
        let data_type = DataType::uint8();
        let request = FilterRequest {
            shuffle: true,
            fletcher32: true,
            ..Default::default()
        };
        let (store, chunk_store) =
            chunk_store(data_type.clone(), FillValue::zero(&data_type), &request);
        let options = CodecOptions::default();
        chunk_store
            .store_chunk(&[1, 0], ArrayBytes::Fixed(vec![1, 2, 3, 4]), &options)
            .unwrap();
        assert_eq!(
            store.get(&StoreKey::new("data/c/1/0").unwrap()).unwrap().map(|v| v.len()),
            Some(8)
        );
        assert_eq!(
            chunk_store.retrieve_chunk(&[1, 0], &options).unwrap(),
            ArrayBytes::Fixed(vec![1, 2, 3, 4])
        );
        assert_eq!(chunk_store.stored_chunks().unwrap(), vec![vec![1, 0]]);

        chunk_store
            .update_chunk(&[1, 0], false, &options, |buffer| {
                buffer.set_element(3, &[9]);
            })
            .unwrap();
        assert_eq!(
            chunk_store.retrieve_chunk(&[1, 0], &options).unwrap(),
            ArrayBytes::Fixed(vec![1, 2, 3, 9])
        );

        chunk_store.erase_chunks(&[vec![1, 0]]).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn chunk_store_corrupt_chunk() {
        let data_type = DataType::uint16();
        let (store, chunk_store) =
            chunk_store(data_type.clone(), FillValue::zero(&data_type), &FilterRequest::default());
        store
            .set(&StoreKey::new("data/c/0/0").unwrap(), vec![1, 2, 3])
            .unwrap();
        let err = chunk_store
            .retrieve_chunk(&[0, 0], &CodecOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn chunk_serialization_variable() {
        let data_type = DataType::vlen_string(Charset::Utf8);
        let bytes = ArrayBytes::Variable(b"abcde".to_vec(), vec![0, 2, 2, 5]);
        let serialized = serialize_chunk(bytes.clone());
        assert_eq!(serialized.len(), 3 * VLEN_REFERENCE_SIZE + 5);
        assert_eq!(&serialized[3 * VLEN_REFERENCE_SIZE..], b"abcde");
        assert_eq!(deserialize_chunk(serialized, &data_type, 3).unwrap(), bytes);

        let mut invalid = serialize_chunk(ArrayBytes::Variable(b"ab".to_vec(), vec![0, 2]));
        invalid[8] = 3;
        assert!(deserialize_chunk(invalid, &data_type, 1).is_err());
        assert!(deserialize_chunk(vec![0; 8], &data_type, 1).is_err());
    }
}
