//! Dataspaces and chunk layouts.
//!
//! A [`Dataspace`] is the index space of a dataset: null (no addressable extent), scalar, or simple with a shape and maximum shape.
//! The [`ChunkLayout`] of a dataset is resolved from its dataspace and the requested [`Chunks`].

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{chunk_grid::auto_chunk_shape, config::global_config, num_elements, ArrayShape, ErrorKind};

/// The maximum extent of a dimension.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MaxExtent {
    /// A concrete maximum extent.
    Bounded(u64),
    /// No maximum extent.
    Unbounded,
}

impl MaxExtent {
    /// Returns true if `extent` does not exceed the maximum extent.
    #[must_use]
    pub fn admits(&self, extent: u64) -> bool {
        match self {
            Self::Bounded(max) => extent <= *max,
            Self::Unbounded => true,
        }
    }
}

impl From<u64> for MaxExtent {
    fn from(extent: u64) -> Self {
        Self::Bounded(extent)
    }
}

impl From<Option<u64>> for MaxExtent {
    fn from(extent: Option<u64>) -> Self {
        extent.map_or(Self::Unbounded, Self::Bounded)
    }
}

/// The index space of a dataset.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum Dataspace {
    /// An empty dataspace with no addressable extent.
    Null,
    /// A zero-dimensional dataspace with a single element.
    Scalar,
    /// An N-dimensional dataspace.
    Simple {
        /// The current shape.
        shape: ArrayShape,
        /// The maximum shape.
        maxshape: Vec<MaxExtent>,
    },
}

/// The requested chunking of a new dataset.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Chunks {
    /// Chunk if required, with an automatically determined chunk shape.
    #[default]
    Default,
    /// Chunked with an automatically determined chunk shape.
    Auto,
    /// Not chunked.
    Contiguous,
    /// Chunked with an explicit chunk shape.
    Explicit(ArrayShape),
}

/// The storage layout of a dataset.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum ChunkLayout {
    /// A single chunk covering the whole dataspace.
    Contiguous,
    /// Regular chunks of `chunk_shape`.
    Chunked {
        /// The chunk shape.
        chunk_shape: ArrayShape,
    },
}

/// A dataspace error.
#[derive(Clone, Debug, Error)]
pub enum DataspaceError {
    /// A maximum shape which does not match the shape.
    #[error("maxshape {maxshape:?} is incompatible with shape {shape:?}")]
    InvalidMaxshape {
        /// The shape.
        shape: ArrayShape,
        /// The maximum shape.
        maxshape: Vec<MaxExtent>,
    },
    /// A shape with the wrong number of dimensions.
    #[error("expected {expected} dimensions, got {got}")]
    RankMismatch {
        /// The number of dimensions given.
        got: usize,
        /// The number of dimensions of the dataspace.
        expected: usize,
    },
    /// An extent beyond the maximum extent.
    #[error("extent {extent} of axis {axis} exceeds the maximum extent {max:?}")]
    ExceedsMaxshape {
        /// The axis.
        axis: usize,
        /// The requested extent.
        extent: u64,
        /// The maximum extent.
        max: MaxExtent,
    },
    /// An axis outside of `[0, rank)`.
    #[error("axis {axis} is out of range for rank {rank}")]
    InvalidAxis {
        /// The axis.
        axis: usize,
        /// The rank.
        rank: usize,
    },
    /// Chunking requested on a dataspace which cannot be chunked.
    #[error("{0} dataspaces do not support chunk or filter options")]
    ChunkingNotSupported(&'static str),
    /// An invalid chunk shape.
    #[error("invalid chunk shape {chunk_shape:?}: {reason}")]
    InvalidChunkShape {
        /// The chunk shape.
        chunk_shape: ArrayShape,
        /// The reason the chunk shape is invalid.
        reason: &'static str,
    },
    /// A contiguous layout requested where chunking is required.
    #[error("a chunked layout is required for the given maxshape or filters")]
    ChunkingRequired,
    /// An operation which requires a simple dataspace.
    #[error("operation is not supported on a {0} dataspace")]
    NotSimple(&'static str),
}

impl DataspaceError {
    /// Returns the [`ErrorKind`] of the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ChunkingNotSupported(_) | Self::NotSimple(_) => ErrorKind::Type,
            Self::InvalidMaxshape { .. }
            | Self::RankMismatch { .. }
            | Self::ExceedsMaxshape { .. }
            | Self::InvalidAxis { .. }
            | Self::InvalidChunkShape { .. }
            | Self::ChunkingRequired => ErrorKind::Value,
        }
    }
}

impl Dataspace {
    /// Create a simple dataspace.
    ///
    /// If `maxshape` is [`None`], the maximum shape is the shape.
    ///
    /// # Errors
    /// Returns [`DataspaceError::InvalidMaxshape`] if `maxshape` has a different rank than `shape` or is smaller than `shape`.
    pub fn new_simple(
        shape: ArrayShape,
        maxshape: Option<Vec<MaxExtent>>,
    ) -> Result<Self, DataspaceError> {
        let maxshape =
            maxshape.unwrap_or_else(|| shape.iter().copied().map(MaxExtent::Bounded).collect());
        if maxshape.len() != shape.len()
            || std::iter::zip(&shape, &maxshape).any(|(extent, max)| !max.admits(*extent))
        {
            return Err(DataspaceError::InvalidMaxshape { shape, maxshape });
        }
        if shape.is_empty() {
            Ok(Self::Scalar)
        } else {
            Ok(Self::Simple { shape, maxshape })
        }
    }

    /// Returns the name of the dataspace class.
    #[must_use]
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Scalar => "scalar",
            Self::Simple { .. } => "simple",
        }
    }

    /// Returns the shape, or [`None`] for a null dataspace.
    #[must_use]
    pub fn shape(&self) -> Option<&[u64]> {
        match self {
            Self::Null => None,
            Self::Scalar => Some(&[]),
            Self::Simple { shape, .. } => Some(shape),
        }
    }

    /// Returns the maximum shape, or [`None`] for a null dataspace.
    #[must_use]
    pub fn maxshape(&self) -> Option<&[MaxExtent]> {
        match self {
            Self::Null => None,
            Self::Scalar => Some(&[]),
            Self::Simple { maxshape, .. } => Some(maxshape),
        }
    }

    /// Returns the number of dimensions.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape().map_or(0, <[u64]>::len)
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.shape().map_or(0, num_elements)
    }

    /// Returns true if the dataspace is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true if the dataspace is scalar.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar)
    }

    /// Returns true if the maximum shape equals the shape.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        match self {
            Self::Null | Self::Scalar => true,
            Self::Simple { shape, maxshape } => std::iter::zip(shape, maxshape)
                .all(|(extent, max)| *max == MaxExtent::Bounded(*extent)),
        }
    }

    /// Return the dataspace with `shape`, validated against the maximum shape.
    ///
    /// # Errors
    /// Returns a [`DataspaceError`] if the dataspace is not simple, `shape` has the wrong rank, or exceeds the maximum shape.
    pub fn resized(&self, shape: ArrayShape) -> Result<Self, DataspaceError> {
        let Self::Simple { maxshape, .. } = self else {
            return Err(DataspaceError::NotSimple(self.class_name()));
        };
        if shape.len() != maxshape.len() {
            return Err(DataspaceError::RankMismatch {
                got: shape.len(),
                expected: maxshape.len(),
            });
        }
        for (axis, (extent, max)) in std::iter::zip(&shape, maxshape).enumerate() {
            if !max.admits(*extent) {
                return Err(DataspaceError::ExceedsMaxshape {
                    axis,
                    extent: *extent,
                    max: *max,
                });
            }
        }
        Ok(Self::Simple {
            shape,
            maxshape: maxshape.clone(),
        })
    }

    /// Resolve the chunk layout of a new dataset.
    ///
    /// A simple dataspace is chunked if chunks are requested, its maximum shape differs from its shape, or filters are present.
    ///
    /// # Errors
    /// Returns a [`DataspaceError`] if
    ///  - chunking or filters are requested on a null or scalar dataspace,
    ///  - a contiguous layout is requested where chunking is required, or
    ///  - an explicit chunk shape has the wrong rank, a zero extent, or exceeds the maximum shape.
    pub fn resolve_chunk_layout(
        &self,
        chunks: &Chunks,
        element_size: usize,
        has_filters: bool,
    ) -> Result<ChunkLayout, DataspaceError> {
        let (shape, maxshape) = match self {
            Self::Null | Self::Scalar => {
                return if matches!(chunks, Chunks::Auto | Chunks::Explicit(_)) || has_filters {
                    Err(DataspaceError::ChunkingNotSupported(self.class_name()))
                } else {
                    Ok(ChunkLayout::Contiguous)
                };
            }
            Self::Simple { shape, maxshape } => (shape, maxshape),
        };
        let chunking_required = !self.is_fixed() || has_filters;
        let auto = || {
            let (min_bytes, max_bytes) = {
                let config = global_config();
                (config.auto_chunk_min_bytes(), config.auto_chunk_max_bytes())
            };
            let chunk_shape = auto_chunk_shape(shape, maxshape, element_size, min_bytes, max_bytes);
            debug!("auto chunk shape {chunk_shape:?} for shape {shape:?} and element size {element_size}");
            ChunkLayout::Chunked { chunk_shape }
        };
        match chunks {
            Chunks::Default if chunking_required => Ok(auto()),
            Chunks::Default => Ok(ChunkLayout::Contiguous),
            Chunks::Contiguous if chunking_required => Err(DataspaceError::ChunkingRequired),
            Chunks::Contiguous => Ok(ChunkLayout::Contiguous),
            Chunks::Auto => Ok(auto()),
            Chunks::Explicit(chunk_shape) => {
                let invalid = |reason| DataspaceError::InvalidChunkShape {
                    chunk_shape: chunk_shape.clone(),
                    reason,
                };
                if chunk_shape.len() != shape.len() {
                    Err(invalid("the number of dimensions does not match the dataspace"))
                } else if chunk_shape.iter().any(|&c| c == 0) {
                    Err(invalid("chunk extents must be at least 1"))
                } else if std::iter::zip(chunk_shape, maxshape).any(|(c, max)| !max.admits(*c)) {
                    Err(invalid("chunk extents must not exceed the maximum shape"))
                } else {
                    Ok(ChunkLayout::Chunked {
                        chunk_shape: chunk_shape.clone(),
                    })
                }
            }
        }
    }
}

impl ChunkLayout {
    /// Returns true if the layout is chunked.
    #[must_use]
    pub fn is_chunked(&self) -> bool {
        matches!(self, Self::Chunked { .. })
    }

    /// Returns the chunk shape, or [`None`] if contiguous.
    #[must_use]
    pub fn chunk_shape(&self) -> Option<&[u64]> {
        match self {
            Self::Contiguous => None,
            Self::Chunked { chunk_shape } => Some(chunk_shape),
        }
    }

    /// Returns the shape of the storage chunks for a dataset of `shape`.
    ///
    /// A contiguous dataset is stored as a single chunk covering its shape.
    #[must_use]
    pub fn storage_chunk_shape(&self, shape: &[u64]) -> ArrayShape {
        match self {
            Self::Contiguous => shape.iter().map(|&extent| extent.max(1)).collect(),
            Self::Chunked { chunk_shape } => chunk_shape.clone(),
        }
    }
}
