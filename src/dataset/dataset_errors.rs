use thiserror::Error;

use crate::{
    chunk_store::ChunkStoreError,
    data_type::{ArrayValueError, CoercionError, DataTypeError, FillValueError},
    dataspace::DataspaceError,
    filter::FilterError,
    node::NodePathError,
    selection::SelectionError,
    storage::StorageError,
    ArrayIndices, ArrayShape, ErrorKind,
};

/// A dataset creation error.
#[derive(Debug, Error)]
pub enum DatasetCreateError {
    /// An invalid node path.
    #[error(transparent)]
    NodePathError(#[from] NodePathError),
    /// None of a shape, data, or the null marker.
    #[error("one of shape, data, or null must be given")]
    MissingShape,
    /// The null marker given with a shape or data.
    #[error("a null dataspace cannot have a shape, maxshape, or data")]
    NullWithShape,
    /// Data which cannot be reshaped to the requested shape.
    #[error(transparent)]
    ArrayValueError(#[from] ArrayValueError),
    /// An invalid dataspace or chunk layout.
    #[error(transparent)]
    DataspaceError(#[from] DataspaceError),
    /// A data type which cannot be inferred from the data.
    #[error(transparent)]
    CoercionError(#[from] CoercionError),
    /// An invalid data type.
    #[error(transparent)]
    DataTypeError(#[from] DataTypeError),
    /// An invalid fill value.
    #[error(transparent)]
    FillValueError(#[from] FillValueError),
    /// An invalid filter request.
    #[error(transparent)]
    FilterError(#[from] FilterError),
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// Metadata which is missing.
    #[error("dataset metadata is missing")]
    MissingMetadata,
    /// A failure writing the initial data.
    #[error(transparent)]
    DatasetError(#[from] DatasetError),
}

impl DatasetCreateError {
    /// Returns the [`ErrorKind`] of the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NodePathError(err) => err.kind(),
            Self::MissingShape | Self::NullWithShape => ErrorKind::Type,
            Self::ArrayValueError(err) => err.kind(),
            Self::DataspaceError(err) => err.kind(),
            Self::CoercionError(err) => err.kind(),
            Self::DataTypeError(err) => err.kind(),
            Self::FillValueError(err) => err.kind(),
            Self::FilterError(err) => err.kind(),
            Self::StorageError(err) => err.kind(),
            Self::MissingMetadata => ErrorKind::Value,
            Self::DatasetError(err) => err.kind(),
        }
    }
}

/// Dataset errors.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// A chunk store error.
    #[error(transparent)]
    ChunkStoreError(#[from] ChunkStoreError),
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// An invalid selection.
    #[error(transparent)]
    SelectionError(#[from] SelectionError),
    /// An invalid resize.
    #[error(transparent)]
    DataspaceError(#[from] DataspaceError),
    /// A value which cannot be coerced to the data type.
    #[error(transparent)]
    CoercionError(#[from] CoercionError),
    /// An invalid field selection or enum lookup.
    #[error(transparent)]
    DataTypeError(#[from] DataTypeError),
    /// The shape of the data does not match the shape of the selection.
    #[error("cannot broadcast data of shape {data:?} to selection of shape {selection:?}")]
    ShapeMismatch {
        /// The shape of the selection.
        selection: ArrayShape,
        /// The shape of the data.
        data: ArrayShape,
    },
    /// An operation which requires an addressable extent on a null dataspace.
    #[error("{0} is not supported on a null dataspace")]
    NullDataspace(&'static str),
    /// An operation which requires at least one dimension on a scalar dataspace.
    #[error("{0} is not supported on a scalar dataspace")]
    ScalarDataspace(&'static str),
    /// An operation which requires a chunked layout.
    #[error("{0} requires a chunked dataset")]
    NotChunked(&'static str),
    /// A direct buffer which is not contiguous in row-major order.
    #[error("direct buffers must be contiguous in row-major order")]
    NonContiguousBuffer,
    /// Direct transfer of variable-length elements.
    #[error("direct transfer is not supported for variable-length data type {0}")]
    VariableLengthBuffer(String),
    /// A direct buffer whose size does not match its shape.
    #[error("direct buffer of {got} bytes, expected {expected} bytes")]
    InvalidBufferSize {
        /// The expected number of bytes.
        expected: usize,
        /// The number of bytes in the buffer.
        got: usize,
    },
    /// A stored chunk index which is out of range.
    #[error("chunk index {index} is out of range for {num_chunks} stored chunks")]
    ChunkIndexOutOfRange {
        /// The chunk index.
        index: usize,
        /// The number of stored chunks.
        num_chunks: usize,
    },
    /// Element coordinates which are outside of the dataset.
    #[error("coordinates {coordinates:?} are outside of a dataset of shape {shape:?}")]
    InvalidCoordinates {
        /// The coordinates.
        coordinates: ArrayIndices,
        /// The shape of the dataset.
        shape: ArrayShape,
    },
    /// A string view of a dataset which does not hold strings.
    #[error("data type {0} is not a string type")]
    NotString(String),
}

impl DatasetError {
    /// Returns the [`ErrorKind`] of the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ChunkStoreError(err) => err.kind(),
            Self::StorageError(err) => err.kind(),
            Self::SelectionError(err) => err.kind(),
            Self::DataspaceError(err) => err.kind(),
            Self::CoercionError(err) => err.kind(),
            Self::DataTypeError(err) => err.kind(),
            Self::ShapeMismatch { .. }
            | Self::NullDataspace(_)
            | Self::ScalarDataspace(_)
            | Self::NotChunked(_)
            | Self::NonContiguousBuffer
            | Self::VariableLengthBuffer(_)
            | Self::NotString(_) => ErrorKind::Type,
            Self::InvalidBufferSize { .. }
            | Self::ChunkIndexOutOfRange { .. }
            | Self::InvalidCoordinates { .. } => ErrorKind::Value,
        }
    }
}
