//! Datasets.
//!
//! A [`Dataset`] is a typed N-dimensional array in a store.
//! It composes a [`DataType`], a [`Dataspace`], a [`FilterPipeline`] and a [`ChunkStore`], and is identified by its [`NodePath`].
//!
//! Reads and writes take a [`Selection`], which is resolved against the current shape and mapped onto the chunks it intersects.
//! Chunks are visited in row-major order of their chunk indices.
//! The `par_` variants of [`Dataset::read`] and [`Dataset::write`] process chunks concurrently.
//!
//! The dataspace is guarded by a lock: a resize holds it exclusively, so reads and writes never observe a partially resized dataset.

mod dataset_builder;
mod dataset_errors;
mod dataset_metadata;
mod direct_buffer;
mod fields_view;
mod string_view;

pub use dataset_builder::DatasetBuilder;
pub use dataset_errors::{DatasetCreateError, DatasetError};
pub use dataset_metadata::{DatasetMetadata, DATASET_FORMAT_VERSION};
pub use direct_buffer::DirectBuffer;
pub use fields_view::FieldsView;
pub use string_view::{decode_text, DecodeErrors, StringView, TextCodec};

use itertools::izip;
use log::debug;
use parking_lot::RwLock;
use rayon::prelude::*;
use rayon_iter_concurrent_limit::iter_concurrent_limit;

use crate::{
    array_bytes::{ArrayBytes, ElementBuffer},
    array_subset::ArraySubset,
    chunk_grid::RegularChunkGrid,
    chunk_store::{ChunkStore, ChunkStoreError},
    config::global_config,
    data_type::{
        ArrayValue, Charset, CoercionError, DataType, DataTypeError, FieldSelection, FillValue,
        SourceType, Value,
    },
    dataspace::{ChunkLayout, Dataspace, DataspaceError, MaxExtent},
    filter::{CodecOptions, FilterPipeline},
    node::NodePath,
    selection::{ChunkSelection, ChunkSlices, ResolvedSelection, Selection, SelectionItem},
    storage::{dataset_metadata_key, ReadableWritableListableStorage, StorageError},
    to_usize,
    typed_array::TypedArray,
    ArrayIndices, ArrayShape,
};

/// A dataset.
pub struct Dataset {
    storage: ReadableWritableListableStorage,
    path: NodePath,
    layout: ChunkLayout,
    dataspace: RwLock<Dataspace>,
    chunk_store: ChunkStore,
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("path", &self.path)
            .field("layout", &self.layout)
            .field("dataspace", &*self.dataspace.read())
            .field("chunk_store", &self.chunk_store)
            .finish_non_exhaustive()
    }
}

/// Return the number of chunks to process concurrently.
pub(crate) fn chunk_concurrent_limit(options: &CodecOptions, num_chunks: usize) -> usize {
    let minimum = global_config().chunk_concurrent_minimum();
    std::cmp::max(options.concurrent_target(), minimum).clamp(1, num_chunks.max(1))
}

fn resolve(
    dataspace: &Dataspace,
    selection: &Selection,
) -> Result<ResolvedSelection, DatasetError> {
    Ok(selection.resolve(
        dataspace.shape().unwrap_or_default(),
        dataspace.maxshape().unwrap_or_default(),
    )?)
}

/// Copy the selected elements of a chunk to the logical output.
fn gather(
    output: &mut ElementBuffer,
    chunk: &ElementBuffer,
    chunk_selection: &ChunkSelection,
    fields: Option<&FieldSelection>,
) {
    for run in chunk_selection.copy_runs() {
        let (chunk_index, output_index, len) =
            (to_usize(run.chunk), to_usize(run.output), to_usize(run.len));
        match fields {
            None => output.copy_run(output_index, chunk, chunk_index, len),
            Some(fields) => {
                let mut view = vec![0; fields.data_type().stored_size()];
                for i in 0..len {
                    let element = chunk.element(chunk_index + i);
                    for copy in fields.copies() {
                        view[copy.view_offset..copy.view_offset + copy.size].copy_from_slice(
                            &element[copy.full_offset..copy.full_offset + copy.size],
                        );
                    }
                    output.set_element(output_index + i, &view);
                }
            }
        }
    }
}

/// Copy the source elements of a chunk selection into the chunk.
///
/// A broadcast source holds a single element.
fn scatter(
    chunk: &mut ElementBuffer,
    source: &ElementBuffer,
    broadcast: bool,
    chunk_selection: &ChunkSelection,
    fields: Option<&FieldSelection>,
) {
    for run in chunk_selection.copy_runs() {
        let (chunk_index, output_index, len) =
            (to_usize(run.chunk), to_usize(run.output), to_usize(run.len));
        if fields.is_none() && !broadcast {
            chunk.copy_run(chunk_index, source, output_index, len);
            continue;
        }
        for i in 0..len {
            let element = source.element(if broadcast { 0 } else { output_index + i });
            match fields {
                None => chunk.set_element(chunk_index + i, element),
                Some(fields) => {
                    let mut full = chunk.element(chunk_index + i).to_vec();
                    for copy in fields.copies() {
                        full[copy.full_offset..copy.full_offset + copy.size].copy_from_slice(
                            &element[copy.view_offset..copy.view_offset + copy.size],
                        );
                    }
                    chunk.set_element(chunk_index + i, &full);
                }
            }
        }
    }
}

/// The location and stored size of a chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkInfo {
    /// The indices of the first element of the chunk.
    pub chunk_offset: ArrayIndices,
    /// The number of bytes of the encoded chunk.
    pub size: u64,
}

impl Dataset {
    pub(crate) fn new_with_pipeline(
        storage: ReadableWritableListableStorage,
        path: NodePath,
        metadata: DatasetMetadata,
        pipeline: FilterPipeline,
    ) -> Self {
        let chunk_shape = metadata
            .layout
            .storage_chunk_shape(metadata.dataspace.shape().unwrap_or_default());
        let chunk_store = ChunkStore::new(
            storage.clone(),
            path.clone(),
            metadata.data_type,
            metadata.fill_value,
            pipeline,
            RegularChunkGrid::new(chunk_shape),
        );
        Self {
            storage,
            path,
            layout: metadata.layout,
            dataspace: RwLock::new(metadata.dataspace),
            chunk_store,
        }
    }

    /// Create a dataset at `path` of `storage` with the dataspace, layout, data type, fill value, and filters of this dataset.
    ///
    /// Does not modify the store.
    pub(crate) fn new_like(&self, storage: ReadableWritableListableStorage, path: NodePath) -> Self {
        Self::new_with_pipeline(storage, path, self.metadata(), self.filters().clone())
    }

    /// Open the dataset at `path` of `storage`.
    ///
    /// # Errors
    /// Returns a [`DatasetCreateError`] if the path is invalid, the metadata is missing or invalid, or the store fails.
    pub fn open(
        storage: ReadableWritableListableStorage,
        path: &str,
    ) -> Result<Self, DatasetCreateError> {
        let path = NodePath::new(path)?;
        let key = dataset_metadata_key(&path);
        let Some(bytes) = storage.get(&key)? else {
            return Err(DatasetCreateError::MissingMetadata);
        };
        let metadata: DatasetMetadata = serde_json::from_slice(&bytes)
            .map_err(|err| StorageError::InvalidMetadata(key, err.to_string()))?;
        let pipeline = FilterPipeline::from_metadata(&metadata.filters, &metadata.data_type)?;
        Ok(Self::new_with_pipeline(storage, path, metadata, pipeline))
    }

    fn metadata_with(&self, dataspace: Dataspace) -> DatasetMetadata {
        DatasetMetadata {
            format_version: DATASET_FORMAT_VERSION,
            data_type: self.data_type().clone(),
            dataspace,
            layout: self.layout.clone(),
            fill_value: self.fill_value().clone(),
            filters: self.filters().metadata(),
        }
    }

    /// Create the metadata of the dataset.
    #[must_use]
    pub fn metadata(&self) -> DatasetMetadata {
        self.metadata_with(self.dataspace())
    }

    fn write_metadata(&self, metadata: &DatasetMetadata) -> Result<(), StorageError> {
        let key = dataset_metadata_key(&self.path);
        let bytes = serde_json::to_vec_pretty(metadata)
            .map_err(|err| StorageError::InvalidMetadata(key.clone(), err.to_string()))?;
        self.storage.set(&key, bytes)
    }

    /// Store the metadata of the dataset.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying store error.
    pub fn store_metadata(&self) -> Result<(), StorageError> {
        self.write_metadata(&self.metadata())
    }

    /// Returns the node path of the dataset.
    #[must_use]
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Returns the dataspace.
    #[must_use]
    pub fn dataspace(&self) -> Dataspace {
        self.dataspace.read().clone()
    }

    /// Returns the shape, or [`None`] for a null dataspace.
    #[must_use]
    pub fn shape(&self) -> Option<ArrayShape> {
        self.dataspace.read().shape().map(<[u64]>::to_vec)
    }

    /// Returns the maximum shape, or [`None`] for a null dataspace.
    #[must_use]
    pub fn maxshape(&self) -> Option<Vec<MaxExtent>> {
        self.dataspace.read().maxshape().map(<[MaxExtent]>::to_vec)
    }

    /// Returns the number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.dataspace.read().rank()
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.dataspace.read().num_elements()
    }

    /// Returns the chunk shape, or [`None`] if the dataset is not chunked.
    #[must_use]
    pub fn chunks(&self) -> Option<ArrayShape> {
        self.layout.chunk_shape().map(<[u64]>::to_vec)
    }

    /// Returns the storage layout.
    #[must_use]
    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    /// Returns the data type.
    #[must_use]
    pub fn data_type(&self) -> &DataType {
        self.chunk_store.data_type()
    }

    /// Returns the fill value.
    #[must_use]
    pub fn fill_value(&self) -> &FillValue {
        self.chunk_store.fill_value()
    }

    /// Returns the filter pipeline.
    #[must_use]
    pub fn filters(&self) -> &FilterPipeline {
        self.chunk_store.pipeline()
    }

    /// Returns the chunk store.
    #[must_use]
    pub fn chunk_store(&self) -> &ChunkStore {
        &self.chunk_store
    }

    /// Returns the extent of the first dimension.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] with [`ErrorKind::Type`](crate::ErrorKind::Type) for a null or scalar dataspace.
    pub fn len(&self) -> Result<u64, DatasetError> {
        match &*self.dataspace.read() {
            Dataspace::Null => Err(DatasetError::NullDataspace("len")),
            Dataspace::Scalar => Err(DatasetError::ScalarDataspace("len")),
            Dataspace::Simple { shape, .. } => Ok(shape[0]),
        }
    }

    /// Returns true if the dataset has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn field_selection(&self, selection: &Selection) -> Result<Option<FieldSelection>, DatasetError> {
        if selection.fields().is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.data_type().select_fields(selection.fields())?))
        }
    }

    /// Read the elements of a resolved selection.
    ///
    /// The caller holds the dataspace lock.
    fn read_resolved(
        &self,
        resolved: &ResolvedSelection,
        fields: Option<&FieldSelection>,
        options: &CodecOptions,
        parallel: bool,
    ) -> Result<ElementBuffer, DatasetError> {
        let data_type = fields.map_or(self.data_type(), FieldSelection::data_type);
        let mut output = ElementBuffer::new_fill_value(
            data_type,
            to_usize(resolved.num_elements()),
            &FillValue::zero(data_type),
        );
        let chunk_selections = resolved.chunk_selections(self.chunk_store.chunk_grid());
        if parallel && chunk_selections.len() > 1 {
            let chunk_selections: Vec<ChunkSelection> = chunk_selections.collect();
            let limit = chunk_concurrent_limit(options, chunk_selections.len());
            let retrieve_chunk = |chunk_selection: ChunkSelection| {
                self.chunk_store
                    .retrieve_chunk_buffer(chunk_selection.chunk_indices(), options)
                    .map(|chunk| (chunk_selection, chunk))
            };
            let chunks = iter_concurrent_limit!(limit, chunk_selections, map, retrieve_chunk)
                .collect::<Result<Vec<_>, _>>()?;
            for (chunk_selection, chunk) in &chunks {
                gather(&mut output, chunk, chunk_selection, fields);
            }
        } else {
            for chunk_selection in chunk_selections {
                let chunk = self
                    .chunk_store
                    .retrieve_chunk_buffer(chunk_selection.chunk_indices(), options)?;
                gather(&mut output, &chunk, &chunk_selection, fields);
            }
        }
        Ok(output)
    }

    fn read_impl(
        &self,
        selection: &Selection,
        options: &CodecOptions,
        parallel: bool,
    ) -> Result<TypedArray, DatasetError> {
        let fields = self.field_selection(selection)?;
        let data_type = fields
            .as_ref()
            .map_or(self.data_type(), FieldSelection::data_type)
            .clone();
        let dataspace = self.dataspace.read();
        if dataspace.is_null() {
            let bytes = ArrayBytes::new_fill_value(&data_type, 0, &FillValue::zero(&data_type));
            return Ok(TypedArray::new_unchecked(data_type, vec![0], bytes));
        }
        let resolved = resolve(&dataspace, selection)?;
        let output = self.read_resolved(&resolved, fields.as_ref(), options, parallel)?;
        Ok(TypedArray::new_unchecked(
            data_type,
            resolved.shape(),
            output.into_array_bytes(),
        ))
    }

    /// Read the elements of `selection`.
    ///
    /// The returned array has the data type of the dataset (or of the selected fields) and the logical shape of the selection.
    /// Elements of chunks which have never been written are the fill value.
    /// A null dataspace reads as an empty one dimensional array.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if the selection is invalid, or a chunk cannot be retrieved or decoded.
    pub fn read(&self, selection: &Selection) -> Result<TypedArray, DatasetError> {
        self.read_opt(selection, &CodecOptions::default())
    }

    /// Explicit options version of [`read`](Dataset::read).
    #[allow(clippy::missing_errors_doc)]
    pub fn read_opt(
        &self,
        selection: &Selection,
        options: &CodecOptions,
    ) -> Result<TypedArray, DatasetError> {
        self.read_impl(selection, options, false)
    }

    /// Read the elements of `selection`, retrieving chunks concurrently.
    ///
    /// # Errors
    /// See [`Dataset::read`].
    pub fn par_read(&self, selection: &Selection) -> Result<TypedArray, DatasetError> {
        self.par_read_opt(selection, &CodecOptions::default())
    }

    /// Explicit options version of [`par_read`](Dataset::par_read).
    #[allow(clippy::missing_errors_doc)]
    pub fn par_read_opt(
        &self,
        selection: &Selection,
        options: &CodecOptions,
    ) -> Result<TypedArray, DatasetError> {
        self.read_impl(selection, options, true)
    }

    /// Read the elements of `selection` converted to `data_type`.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if the read fails or an element cannot be represented by `data_type`.
    pub fn read_as(
        &self,
        selection: &Selection,
        data_type: &DataType,
    ) -> Result<TypedArray, DatasetError> {
        Ok(self.read(selection)?.astype(data_type)?)
    }

    /// Write encoded elements to a resolved selection.
    ///
    /// The caller holds the dataspace lock.
    fn write_resolved(
        &self,
        resolved: &ResolvedSelection,
        fields: Option<&FieldSelection>,
        source: &ElementBuffer,
        broadcast: bool,
        options: &CodecOptions,
        parallel: bool,
    ) -> Result<(), DatasetError> {
        // Reject unencodable values before any chunk is stored.
        if let (Some(scale_offset), None, ElementBuffer::Fixed { bytes, .. }) =
            (self.filters().scaleoffset(), fields, source)
        {
            scale_offset
                .check_representable(bytes)
                .map_err(ChunkStoreError::from)?;
        }
        let store_chunk = |chunk_selection: ChunkSelection| {
            let whole_chunk = fields.is_none() && chunk_selection.is_whole_chunk();
            self.chunk_store.update_chunk(
                chunk_selection.chunk_indices(),
                whole_chunk,
                options,
                |chunk| scatter(chunk, source, broadcast, &chunk_selection, fields),
            )
        };
        let chunk_selections = resolved.chunk_selections(self.chunk_store.chunk_grid());
        if parallel && chunk_selections.len() > 1 {
            let chunk_selections: Vec<ChunkSelection> = chunk_selections.collect();
            let limit = chunk_concurrent_limit(options, chunk_selections.len());
            iter_concurrent_limit!(limit, chunk_selections, try_for_each, store_chunk)?;
        } else {
            for chunk_selection in chunk_selections {
                store_chunk(chunk_selection)?;
            }
        }
        Ok(())
    }

    fn write_impl(
        &self,
        selection: &Selection,
        data: ArrayValue,
        options: &CodecOptions,
        parallel: bool,
    ) -> Result<(), DatasetError> {
        let fields = self.field_selection(selection)?;
        let data_type = fields
            .as_ref()
            .map_or(self.data_type(), FieldSelection::data_type);
        let dataspace = self.dataspace.read();
        if dataspace.is_null() {
            return Err(DatasetError::NullDataspace("write"));
        }
        let resolved = resolve(&dataspace, selection)?;
        let selection_shape = resolved.shape();
        if !data.is_scalar() && data.shape() != selection_shape.as_slice() {
            return Err(DatasetError::ShapeMismatch {
                selection: selection_shape,
                data: data.shape().to_vec(),
            });
        }
        if let Some(SourceType::FixedUnicode(_)) = data.source_type() {
            return Err(CoercionError::FixedUnicode.into());
        }
        if resolved.is_empty() {
            return Ok(());
        }
        let bytes = ArrayBytes::from_values(data.values(), data_type)?;
        let source = ElementBuffer::from_array_bytes(bytes, data_type);
        self.write_resolved(
            &resolved,
            fields.as_ref(),
            &source,
            data.is_scalar(),
            options,
            parallel,
        )
    }

    /// Write `data` to the elements of `selection`.
    ///
    /// The shape of `data` must match the logical shape of the selection, or `data` must be zero dimensional, in which case it is broadcast to every selected element.
    /// Every value is coerced to the data type before any chunk is written.
    /// If the selection carries field names, only those fields are written.
    ///
    /// Concurrent writes to the same chunk are serialized, the last writer wins.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if
    ///  - the dataspace is null, or the shape of `data` does not match the selection ([`ErrorKind::Type`](crate::ErrorKind::Type)),
    ///  - the selection is invalid,
    ///  - a value cannot be coerced to the data type, or
    ///  - a chunk cannot be retrieved, encoded, or stored.
    pub fn write(
        &self,
        selection: &Selection,
        data: impl Into<ArrayValue>,
    ) -> Result<(), DatasetError> {
        self.write_opt(selection, data, &CodecOptions::default())
    }

    /// Explicit options version of [`write`](Dataset::write).
    #[allow(clippy::missing_errors_doc)]
    pub fn write_opt(
        &self,
        selection: &Selection,
        data: impl Into<ArrayValue>,
        options: &CodecOptions,
    ) -> Result<(), DatasetError> {
        self.write_impl(selection, data.into(), options, false)
    }

    /// Write `data` to the elements of `selection`, storing chunks concurrently.
    ///
    /// # Errors
    /// See [`Dataset::write`].
    pub fn par_write(
        &self,
        selection: &Selection,
        data: impl Into<ArrayValue>,
    ) -> Result<(), DatasetError> {
        self.par_write_opt(selection, data, &CodecOptions::default())
    }

    /// Explicit options version of [`par_write`](Dataset::par_write).
    #[allow(clippy::missing_errors_doc)]
    pub fn par_write_opt(
        &self,
        selection: &Selection,
        data: impl Into<ArrayValue>,
        options: &CodecOptions,
    ) -> Result<(), DatasetError> {
        self.write_impl(selection, data.into(), options, true)
    }

    fn direct_element_size(
        data_type: &DataType,
        buffer: &DirectBuffer,
    ) -> Result<usize, DatasetError> {
        let Some(element_size) = data_type.fixed_size() else {
            return Err(DatasetError::VariableLengthBuffer(data_type.to_string()));
        };
        if !buffer.is_contiguous() {
            return Err(DatasetError::NonContiguousBuffer);
        }
        let expected = to_usize(crate::num_elements(buffer.shape())) * element_size;
        if buffer.element_size() != element_size || buffer.bytes().len() != expected {
            return Err(DatasetError::InvalidBufferSize {
                expected,
                got: buffer.bytes().len(),
            });
        }
        Ok(element_size)
    }

    fn resolve_buffer(
        buffer: &DirectBuffer,
        selection: &Selection,
    ) -> Result<ResolvedSelection, DatasetError> {
        let maxshape: Vec<MaxExtent> = buffer
            .shape()
            .iter()
            .map(|&extent| MaxExtent::Bounded(extent))
            .collect();
        Ok(selection.resolve(buffer.shape(), &maxshape)?)
    }

    /// Read the elements of `source_selection` directly into the elements of `dest_selection` of `dest`.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] with [`ErrorKind::Type`](crate::ErrorKind::Type) if the dataspace is null, the data type is variable-length, `dest` is not contiguous, or the logical shapes of the selections differ.
    /// Also returns an error if a selection is invalid or the read fails.
    pub fn read_direct(
        &self,
        dest: &mut DirectBuffer,
        source_selection: &Selection,
        dest_selection: &Selection,
    ) -> Result<(), DatasetError> {
        let fields = self.field_selection(source_selection)?;
        let data_type = fields
            .as_ref()
            .map_or(self.data_type(), FieldSelection::data_type);
        let dataspace = self.dataspace.read();
        if dataspace.is_null() {
            return Err(DatasetError::NullDataspace("read_direct"));
        }
        let element_size = Self::direct_element_size(data_type, dest)?;
        let source_resolved = resolve(&dataspace, source_selection)?;
        let dest_resolved = Self::resolve_buffer(dest, dest_selection)?;
        if source_resolved.shape() != dest_resolved.shape() {
            return Err(DatasetError::ShapeMismatch {
                selection: dest_resolved.shape(),
                data: source_resolved.shape(),
            });
        }
        let elements = self.read_resolved(
            &source_resolved,
            fields.as_ref(),
            &CodecOptions::default(),
            false,
        )?;
        drop(dataspace);

        let dest_indices = dest_resolved.linear_indices(dest.shape());
        let bytes = dest.bytes_mut();
        for (i, index) in dest_indices.into_iter().enumerate() {
            let offset = to_usize(index) * element_size;
            bytes[offset..offset + element_size].copy_from_slice(elements.element(i));
        }
        Ok(())
    }

    /// Write the elements of `source_selection` of `source` directly to the elements of `dest_selection`.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] with [`ErrorKind::Type`](crate::ErrorKind::Type) if the dataspace is null, the data type is variable-length, `source` is not contiguous, or the logical shapes of the selections differ.
    /// Also returns an error if a selection is invalid or the write fails.
    pub fn write_direct(
        &self,
        source: &DirectBuffer,
        source_selection: &Selection,
        dest_selection: &Selection,
    ) -> Result<(), DatasetError> {
        let fields = self.field_selection(dest_selection)?;
        let data_type = fields
            .as_ref()
            .map_or(self.data_type(), FieldSelection::data_type);
        let dataspace = self.dataspace.read();
        if dataspace.is_null() {
            return Err(DatasetError::NullDataspace("write_direct"));
        }
        let element_size = Self::direct_element_size(data_type, source)?;
        let source_resolved = Self::resolve_buffer(source, source_selection)?;
        let dest_resolved = resolve(&dataspace, dest_selection)?;
        if source_resolved.shape() != dest_resolved.shape() {
            return Err(DatasetError::ShapeMismatch {
                selection: dest_resolved.shape(),
                data: source_resolved.shape(),
            });
        }

        let mut bytes = Vec::with_capacity(to_usize(source_resolved.num_elements()) * element_size);
        for index in source_resolved.linear_indices(source.shape()) {
            let offset = to_usize(index) * element_size;
            bytes.extend_from_slice(&source.bytes()[offset..offset + element_size]);
        }
        let elements = ElementBuffer::Fixed {
            bytes,
            element_size,
        };
        self.write_resolved(
            &dest_resolved,
            fields.as_ref(),
            &elements,
            false,
            &CodecOptions::default(),
            false,
        )
    }

    /// Resize the dataset to `shape`.
    ///
    /// Every extent must not exceed the maximum shape.
    /// The new shape is persisted before any chunk is touched.
    /// Chunks wholly outside of a shrunk shape are then erased without being read, and the out of range elements of partially covered chunks are reset to the fill value.
    /// Elements exposed by growing the dataset read as the fill value.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if
    ///  - the dataset is not chunked, or the dataspace is null or scalar ([`ErrorKind::Type`](crate::ErrorKind::Type)),
    ///  - `shape` has the wrong number of dimensions or exceeds the maximum shape, or
    ///  - the store fails.
    pub fn resize(&self, shape: ArrayShape) -> Result<(), DatasetError> {
        let mut dataspace = self.dataspace.write();
        if !self.layout.is_chunked() {
            return Err(DatasetError::NotChunked("resize"));
        }
        let resized = dataspace.resized(shape)?;
        let old_shape = dataspace.shape().unwrap_or_default().to_vec();
        let new_shape = resized.shape().unwrap_or_default().to_vec();
        self.write_metadata(&self.metadata_with(resized.clone()))?;
        *dataspace = resized;
        if std::iter::zip(&old_shape, &new_shape).any(|(old, new)| new < old) {
            self.reclaim(&old_shape, &new_shape)?;
        }
        debug!("resized {} from {old_shape:?} to {new_shape:?}", self.path);
        Ok(())
    }

    /// Resize `axis` of the dataset to `extent`.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] with [`ErrorKind::Value`](crate::ErrorKind::Value) if `axis` is out of range.
    /// See [`Dataset::resize`] for other errors.
    pub fn resize_axis(&self, extent: u64, axis: usize) -> Result<(), DatasetError> {
        let Some(mut shape) = self.shape() else {
            return Err(DataspaceError::NotSimple(Dataspace::Null.class_name()).into());
        };
        let rank = shape.len();
        let Some(axis_extent) = shape.get_mut(axis) else {
            return Err(DataspaceError::InvalidAxis { axis, rank }.into());
        };
        *axis_extent = extent;
        self.resize(shape)
    }

    /// Erase chunks outside of `new_shape`, and reset the elements of edge chunks outside of `new_shape` to the fill value.
    fn reclaim(&self, old_shape: &[u64], new_shape: &[u64]) -> Result<(), DatasetError> {
        let chunk_grid = self.chunk_store.chunk_grid();
        let chunk_shape = chunk_grid.chunk_shape();
        let mut erase = Vec::new();
        let mut truncate = Vec::new();
        for chunk_indices in self.chunk_store.stored_chunks()? {
            let origin = chunk_grid.chunk_origin(&chunk_indices);
            if izip!(&origin, new_shape).any(|(start, extent)| start >= extent) {
                erase.push(chunk_indices);
            } else if izip!(&origin, chunk_shape, old_shape, new_shape)
                .any(|(start, chunk, old, new)| *new < (start + chunk).min(*old))
            {
                truncate.push(chunk_indices);
            }
        }
        debug!(
            "erasing {} and truncating {} chunks of {}",
            erase.len(),
            truncate.len(),
            self.path
        );
        self.chunk_store.erase_chunks(&erase)?;

        let options = CodecOptions::default();
        let fill_value = self.fill_value().as_bytes();
        let chunk_subset = ArraySubset::new_with_shape(chunk_shape.to_vec());
        for chunk_indices in truncate {
            let origin = chunk_grid.chunk_origin(&chunk_indices);
            self.chunk_store
                .update_chunk(&chunk_indices, false, &options, |chunk| {
                    for (i, local) in chunk_subset.iter_indices().enumerate() {
                        if izip!(&local, &origin, new_shape).any(|(l, o, extent)| l + o >= *extent)
                        {
                            chunk.set_element(i, fill_value);
                        }
                    }
                })?;
        }
        Ok(())
    }

    /// Return an iterator over the regions of the chunks intersecting `selection`, or every chunk if [`None`].
    ///
    /// The selection must be a contiguous hyperslab.
    /// The iterator is lazy, finite, and restartable by cloning.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] with [`ErrorKind::Type`](crate::ErrorKind::Type) if the dataset is not chunked, or an error if the selection is invalid or not contiguous.
    pub fn iter_chunks(&self, selection: Option<&Selection>) -> Result<ChunkSlices, DatasetError> {
        if !self.layout.is_chunked() {
            return Err(DatasetError::NotChunked("chunk iteration"));
        }
        let dataspace = self.dataspace.read();
        let region = match selection {
            Some(selection) => resolve(&dataspace, selection)?.to_array_subset()?,
            None => ArraySubset::new_with_shape(dataspace.shape().unwrap_or_default().to_vec()),
        };
        Ok(ChunkSlices::new(
            self.chunk_store.chunk_grid().clone(),
            region,
        ))
    }

    /// Returns the indices of the stored chunks in row-major order of the chunk grid.
    fn stored_chunks_sorted(&self) -> Result<Vec<ArrayIndices>, DatasetError> {
        if !self.layout.is_chunked() {
            return Err(DatasetError::NotChunked("chunk queries"));
        }
        let mut chunks = self.chunk_store.stored_chunks()?;
        chunks.sort_unstable();
        Ok(chunks)
    }

    fn stored_chunk_info(
        &self,
        chunk_indices: &[u64],
    ) -> Result<Option<ChunkInfo>, DatasetError> {
        let key = self.chunk_store.chunk_key(chunk_indices);
        Ok(self.storage.size_key(&key)?.map(|size| ChunkInfo {
            chunk_offset: self.chunk_store.chunk_grid().chunk_origin(chunk_indices),
            size,
        }))
    }

    /// Returns the number of chunks in the store.
    ///
    /// Chunks which have never been written are not counted.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if the dataset is not chunked, or the store fails.
    pub fn num_chunks(&self) -> Result<usize, DatasetError> {
        Ok(self.stored_chunks_sorted()?.len())
    }

    /// Returns the offset and stored size of the stored chunk at `index`.
    ///
    /// Stored chunks are ordered row-major by their position in the chunk grid.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if
    ///  - the dataset is not chunked ([`ErrorKind::Type`](crate::ErrorKind::Type)),
    ///  - `index` is not less than [`num_chunks`](Dataset::num_chunks) ([`ErrorKind::Value`](crate::ErrorKind::Value)), or
    ///  - the store fails.
    pub fn chunk_info(&self, index: usize) -> Result<ChunkInfo, DatasetError> {
        let chunks = self.stored_chunks_sorted()?;
        let out_of_range = DatasetError::ChunkIndexOutOfRange {
            index,
            num_chunks: chunks.len(),
        };
        match chunks.get(index) {
            Some(chunk_indices) => self
                .stored_chunk_info(chunk_indices)?
                .ok_or(out_of_range),
            None => Err(out_of_range),
        }
    }

    /// Returns the offset and stored size of the chunk holding the element at `coordinates`, or [`None`] if that chunk is not stored.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if the dataset is not chunked, `coordinates` are outside of the dataset ([`ErrorKind::Value`](crate::ErrorKind::Value)), or the store fails.
    pub fn chunk_info_by_coord(
        &self,
        coordinates: &[u64],
    ) -> Result<Option<ChunkInfo>, DatasetError> {
        if !self.layout.is_chunked() {
            return Err(DatasetError::NotChunked("chunk queries"));
        }
        let shape = self.shape().unwrap_or_default();
        if coordinates.len() != shape.len()
            || std::iter::zip(coordinates, &shape).any(|(index, extent)| index >= extent)
        {
            return Err(DatasetError::InvalidCoordinates {
                coordinates: coordinates.to_vec(),
                shape,
            });
        }
        let chunk_indices = self.chunk_store.chunk_grid().chunk_indices(coordinates);
        self.stored_chunk_info(&chunk_indices)
    }

    /// Returns the total number of bytes of the stored chunks.
    ///
    /// This is zero for a null dataspace or if no chunk has been written.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if the store fails.
    pub fn storage_size(&self) -> Result<u64, DatasetError> {
        if self.dataspace.read().is_null() {
            return Ok(0);
        }
        let mut size = 0;
        for chunk_indices in self.chunk_store.stored_chunks()? {
            let key = self.chunk_store.chunk_key(&chunk_indices);
            size += self.storage.size_key(&key)?.unwrap_or_default();
        }
        Ok(size)
    }

    /// Return an iterator reading the dataset one index of the first dimension at a time.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] with [`ErrorKind::Type`](crate::ErrorKind::Type) for a null or scalar dataspace.
    pub fn iter_rows(&self) -> Result<Rows<'_>, DatasetError> {
        let len = self.len()?;
        Ok(Rows {
            dataset: self,
            rows: 0..len,
        })
    }

    /// Return a lazy view decoding string elements as text.
    ///
    /// If `codec` is [`None`], it is derived from the character set of the data type.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] with [`ErrorKind::Type`](crate::ErrorKind::Type) if the data type is not a string.
    pub fn asstr(
        &self,
        codec: Option<TextCodec>,
        errors: DecodeErrors,
    ) -> Result<StringView<'_>, DatasetError> {
        let Some(charset) = self.data_type().charset() else {
            return Err(DatasetError::NotString(self.data_type().to_string()));
        };
        let codec = codec.unwrap_or(match charset {
            Charset::Ascii => TextCodec::Ascii,
            Charset::Utf8 => TextCodec::Utf8,
        });
        Ok(StringView::new(self, codec, errors))
    }

    /// Return a lazy view of the compound fields `names`.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if the data type is not compound or a name is not a field.
    pub fn fields(
        &self,
        names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<FieldsView<'_>, DatasetError> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let fields = self.data_type().select_fields(&names)?;
        Ok(FieldsView::new(self, fields))
    }

    /// Read the elements of `selection` of an enum dataset as member names.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if the data type is not an enum, the read fails, or a value has no member ([`ErrorKind::Value`](crate::ErrorKind::Value)).
    pub fn enum_names(&self, selection: &Selection) -> Result<Vec<String>, DatasetError> {
        let data_type = self.data_type();
        let enum_name = |value: Value| -> Result<String, DatasetError> {
            let value = match value {
                Value::Int(value) => value,
                Value::UInt(value) => i64::try_from(value)
                    .map_err(|_| DataTypeError::EnumMemberNotFound(value.to_string()))?,
                value => {
                    return Err(CoercionError::Incompatible {
                        value: value.variant_name(),
                        data_type: data_type.to_string(),
                    }
                    .into())
                }
            };
            Ok(data_type.enum_name(value)?.to_string())
        };
        self.read(selection)?
            .to_values()?
            .into_iter()
            .map(enum_name)
            .collect()
    }
}

/// An iterator over the first dimension of a [`Dataset`], created by [`Dataset::iter_rows`].
///
/// Each item reads one index of the first dimension, with the remaining dimensions in full.
#[derive(Clone, Debug)]
pub struct Rows<'a> {
    dataset: &'a Dataset,
    rows: std::ops::Range<u64>,
}

impl Iterator for Rows<'_> {
    type Item = Result<TypedArray, DatasetError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        let index = i64::try_from(row).unwrap_or(i64::MAX);
        Some(
            self.dataset
                .read(&Selection::new(vec![SelectionItem::Index(index)])),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.rows.end - self.rows.start).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}
