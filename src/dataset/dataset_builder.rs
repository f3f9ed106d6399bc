use log::debug;

use crate::{
    data_type::{ArrayValue, CoercionError, DataType, FillValue, SourceType, Value},
    dataspace::{Chunks, Dataspace, MaxExtent},
    filter::{Compression, FilterPipeline, FilterRequest, FilterTable, ScaleOffsetRequest},
    node::NodePath,
    selection::Selection,
    storage::ReadableWritableListableStorage,
    ArrayShape,
};

use super::{Dataset, DatasetCreateError, DatasetMetadata, DATASET_FORMAT_VERSION};

/// A [`Dataset`] builder.
///
/// A dataset is created from one of
///  - an explicit shape ([`DatasetBuilder::shape`]),
///  - existing data, from which the shape and data type are inferred ([`DatasetBuilder::data`]), or
///  - the null marker for a dataspace with no addressable extent ([`DatasetBuilder::null`]).
///
/// If both a shape and data are given, the data is reshaped to the shape.
/// The data type defaults to a 32-bit float if neither a data type nor data are given, and the fill value defaults to the zero of the data type.
///
/// Note that [`build`](DatasetBuilder::build) does not modify the store.
/// [`DatasetBuilder::build_and_store`] also stores the metadata and writes the initial data.
///
/// ```rust
/// # use std::sync::Arc;
/// use ndstore::{
///     data_type::DataType,
///     dataset::DatasetBuilder,
///     dataspace::{Chunks, MaxExtent},
/// };
/// # let store = Arc::new(ndstore::storage::MemoryStore::new());
/// let dataset = DatasetBuilder::new()
///     .shape(vec![100, 10])
///     .maxshape(vec![MaxExtent::Unbounded, MaxExtent::Bounded(10)])
///     .data_type(DataType::int32())
///     .chunks(Chunks::Explicit(vec![10, 10]))
///     .fill_value(-1)
///     .compression("gzip")
///     .shuffle(true)
///     .build(store, "/counts")?;
/// assert_eq!(dataset.chunks(), Some(vec![10, 10]));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct DatasetBuilder {
    shape: Option<ArrayShape>,
    maxshape: Option<Vec<MaxExtent>>,
    null: bool,
    data: Option<ArrayValue>,
    data_type: Option<DataType>,
    chunks: Chunks,
    fill_value: Option<Value>,
    filters: FilterRequest,
    filter_table: FilterTable,
}

impl DatasetBuilder {
    /// Create a new dataset builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shape.
    ///
    /// An empty shape creates a scalar dataset.
    pub fn shape(&mut self, shape: ArrayShape) -> &mut Self {
        self.shape = Some(shape);
        self
    }

    /// Set the maximum shape.
    ///
    /// The maximum shape defaults to the shape.
    pub fn maxshape(&mut self, maxshape: Vec<MaxExtent>) -> &mut Self {
        self.maxshape = Some(maxshape);
        self
    }

    /// Create a null dataspace, with no addressable extent.
    pub fn null(&mut self) -> &mut Self {
        self.null = true;
        self
    }

    /// Set the initial data.
    pub fn data(&mut self, data: impl Into<ArrayValue>) -> &mut Self {
        self.data = Some(data.into());
        self
    }

    /// Set the data type.
    pub fn data_type(&mut self, data_type: DataType) -> &mut Self {
        self.data_type = Some(data_type);
        self
    }

    /// Set the chunking.
    pub fn chunks(&mut self, chunks: Chunks) -> &mut Self {
        self.chunks = chunks;
        self
    }

    /// Set the fill value.
    pub fn fill_value(&mut self, fill_value: impl Into<Value>) -> &mut Self {
        self.fill_value = Some(fill_value.into());
        self
    }

    /// Set the compression filter, by name or id.
    pub fn compression(&mut self, compression: impl Into<Compression>) -> &mut Self {
        self.filters.compression = Some(compression.into());
        self
    }

    /// Set the compression options.
    pub fn compression_opts(&mut self, compression_opts: Vec<i64>) -> &mut Self {
        self.filters.compression_opts = Some(compression_opts);
        self
    }

    /// Enable or disable the shuffle filter.
    pub fn shuffle(&mut self, shuffle: bool) -> &mut Self {
        self.filters.shuffle = shuffle;
        self
    }

    /// Enable or disable the fletcher32 checksum filter.
    pub fn fletcher32(&mut self, fletcher32: bool) -> &mut Self {
        self.filters.fletcher32 = fletcher32;
        self
    }

    /// Enable the scale-offset filter.
    pub fn scaleoffset(&mut self, scaleoffset: ScaleOffsetRequest) -> &mut Self {
        self.filters.scaleoffset = Some(scaleoffset);
        self
    }

    /// Accept compression filters which are not in the filter table.
    ///
    /// Chunks of such a dataset can only be transferred with [`CodecOptions::unknown_filter_passthrough`](crate::filter::CodecOptions::unknown_filter_passthrough).
    pub fn allow_unknown_filter(&mut self, allow_unknown_filter: bool) -> &mut Self {
        self.filters.allow_unknown_filter = allow_unknown_filter;
        self
    }

    /// Set the filter table used to resolve compression names and ids.
    pub fn filter_table(&mut self, filter_table: FilterTable) -> &mut Self {
        self.filter_table = filter_table;
        self
    }

    /// Resolve the dataspace and data type, and reshape the initial data.
    fn resolve(&self) -> Result<(Dataspace, DataType, Option<ArrayValue>), DatasetCreateError> {
        if let Some(SourceType::FixedUnicode(_)) =
            self.data.as_ref().and_then(ArrayValue::source_type)
        {
            return Err(CoercionError::FixedUnicode.into());
        }

        let (dataspace, data) = if self.null {
            if self.shape.is_some() || self.maxshape.is_some() || self.data.is_some() {
                return Err(DatasetCreateError::NullWithShape);
            }
            (Dataspace::Null, None)
        } else {
            let data = match (&self.shape, &self.data) {
                (Some(shape), Some(data)) => Some(data.clone().reshape(shape.clone())?),
                (_, data) => data.clone(),
            };
            let shape = self
                .shape
                .clone()
                .or_else(|| data.as_ref().map(|data| data.shape().to_vec()))
                .ok_or(DatasetCreateError::MissingShape)?;
            (
                Dataspace::new_simple(shape, self.maxshape.clone())?,
                data,
            )
        };

        let data_type = match (&self.data_type, &data) {
            (Some(data_type), _) => data_type.clone(),
            (None, Some(data)) => data.infer_data_type()?,
            (None, None) => DataType::float32(),
        };
        data_type.validate()?;
        Ok((dataspace, data_type, data))
    }

    /// Build into a [`Dataset`] at `path` of `storage`.
    ///
    /// Does not modify the store; use [`Dataset::store_metadata`] to persist the dataset.
    ///
    /// # Errors
    /// Returns a [`DatasetCreateError`] if
    ///  - none of a shape, data, or the null marker are given ([`ErrorKind::Type`](crate::ErrorKind::Type)),
    ///  - data cannot be reshaped to the shape, or the maximum shape is smaller than the shape,
    ///  - the data type cannot be inferred from the data (e.g. fixed-width text),
    ///  - the fill value cannot be encoded as the data type,
    ///  - a filter is unknown or has invalid options, or
    ///  - the requested chunking is not valid for the dataspace.
    pub fn build(
        &self,
        storage: ReadableWritableListableStorage,
        path: &str,
    ) -> Result<Dataset, DatasetCreateError> {
        let (dataset, _) = self.build_with_data(storage, path)?;
        Ok(dataset)
    }

    /// Build into a [`Dataset`], store its metadata, and then write the initial data.
    ///
    /// If the initial data cannot be written, the stored metadata remains and the dataset can be reopened.
    ///
    /// # Errors
    /// See [`DatasetBuilder::build`]. Also returns an error if the store fails or the data cannot be written.
    pub fn build_and_store(
        &self,
        storage: ReadableWritableListableStorage,
        path: &str,
    ) -> Result<Dataset, DatasetCreateError> {
        let (dataset, data) = self.build_with_data(storage, path)?;
        dataset.store_metadata()?;
        if let Some(data) = data {
            dataset.write(&Selection::all(), data)?;
        }
        debug!(
            "created dataset {} with {} and {:?}",
            dataset.path(),
            dataset.data_type(),
            dataset.layout()
        );
        Ok(dataset)
    }

    fn build_with_data(
        &self,
        storage: ReadableWritableListableStorage,
        path: &str,
    ) -> Result<(Dataset, Option<ArrayValue>), DatasetCreateError> {
        let path = NodePath::new(path)?;
        let (dataspace, data_type, data) = self.resolve()?;
        let fill_value = match &self.fill_value {
            Some(value) => FillValue::from_value(value, &data_type)?,
            None => FillValue::zero(&data_type),
        };
        let pipeline = FilterPipeline::new(&self.filters, &data_type, &self.filter_table)?;
        let layout = dataspace.resolve_chunk_layout(
            &self.chunks,
            data_type.stored_size(),
            !pipeline.is_empty(),
        )?;
        let metadata = DatasetMetadata {
            format_version: DATASET_FORMAT_VERSION,
            data_type,
            dataspace,
            layout,
            fill_value,
            filters: pipeline.metadata(),
        };
        let dataset = Dataset::new_with_pipeline(storage, path, metadata, pipeline);
        Ok((dataset, data))
    }
}
