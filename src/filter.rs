//! Chunk filter pipelines.
//!
//! A [`FilterPipeline`] is an ordered list of invertible byte transforms applied to every chunk.
//! Stages always run in the order scale-offset, shuffle, compression, fletcher32 on encode, and in reverse on decode.
//!
//! Supported filters:
//!  - `gzip` (id 1, feature `gzip`): deflate compression with a level from 0 to 9.
//!  - `shuffle` (id 2): byte shuffling by element size.
//!  - `fletcher32` (id 3): a fletcher32 checksum appended to the chunk.
//!  - `scaleoffset` (id 6): lossy integer packing (integers) or decimal quantisation (floats).
//!  - `lzf` (id 32000, feature `lzf`): fast lzf compression without options.
//!  - `zstd` (id 32015, feature `zstd`): zstd compression with a level from -7 to 22.
//!
//! Any other filter id can be carried as an [`UnknownFilter`] if explicitly allowed.
//! Unknown filters cannot transform chunks unless [`CodecOptions::unknown_filter_passthrough`] is enabled.

mod filter_table;
mod fletcher32;
#[cfg(feature = "gzip")]
mod gzip;
#[cfg(feature = "lzf")]
mod lzf;
mod options;
mod scale_offset;
mod shuffle;
mod unknown;
#[cfg(feature = "zstd")]
mod zstd;

pub use filter_table::FilterTable;
pub use fletcher32::Fletcher32Filter;
#[cfg(feature = "gzip")]
pub use self::gzip::{
    GzipCompressionLevel, GzipFilter, GzipFilterConfiguration, GzipFilterConfigurationV1,
};
#[cfg(feature = "lzf")]
pub use self::lzf::LzfFilter;
pub use options::{CodecOptions, CodecOptionsBuilder};
pub use scale_offset::{
    ScaleOffsetFilter, ScaleOffsetFilterConfiguration, ScaleOffsetFilterConfigurationV1,
    ScaleOffsetMode,
};
pub use shuffle::ShuffleFilter;
pub use unknown::UnknownFilter;
#[cfg(feature = "zstd")]
pub use self::zstd::{ZstdFilter, ZstdFilterConfiguration, ZstdFilterConfigurationV1};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{config::global_config, data_type::DataType, ErrorKind};

/// The `gzip` (deflate) filter id.
pub const FILTER_GZIP: u32 = 1;
/// The `shuffle` filter id.
pub const FILTER_SHUFFLE: u32 = 2;
/// The `fletcher32` filter id.
pub const FILTER_FLETCHER32: u32 = 3;
/// The `scaleoffset` filter id.
pub const FILTER_SCALEOFFSET: u32 = 6;
/// The `lzf` filter id.
pub const FILTER_LZF: u32 = 32000;
/// The `zstd` filter id.
pub const FILTER_ZSTD: u32 = 32015;

/// Traits common to all filters.
pub trait FilterTraits: std::fmt::Debug + Send + Sync {
    /// The filter id.
    fn id(&self) -> u32;

    /// The filter name.
    fn name(&self) -> &str;

    /// The filter options in their compact integer form, if any.
    fn options(&self) -> Option<Vec<i64>> {
        None
    }

    /// Create the filter metadata for the catalog record.
    fn metadata(&self) -> FilterMetadata;

    /// Encode chunk bytes.
    ///
    /// # Errors
    /// Returns a [`FilterError`] if the filter cannot encode `decoded`.
    fn encode(
        &self,
        decoded: Vec<u8>,
        element_size: usize,
        options: &CodecOptions,
    ) -> Result<Vec<u8>, FilterError>;

    /// Decode chunk bytes.
    ///
    /// # Errors
    /// Returns a [`FilterError`] if `encoded` is invalid or cannot be decoded.
    fn decode(
        &self,
        encoded: Vec<u8>,
        element_size: usize,
        options: &CodecOptions,
    ) -> Result<Vec<u8>, FilterError>;
}

/// The persisted description of a filter stage.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FilterMetadata {
    /// The filter id.
    pub id: u32,
    /// The filter name.
    pub name: String,
    /// The filter configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<serde_json::Value>,
}

impl FilterMetadata {
    /// Create new filter metadata with a serializable configuration.
    #[must_use]
    pub fn new<T: Serialize>(id: u32, name: &str, configuration: Option<&T>) -> Self {
        Self {
            id,
            name: name.to_string(),
            configuration: configuration.and_then(|c| serde_json::to_value(c).ok()),
        }
    }

    /// Deserialize the configuration.
    ///
    /// # Errors
    /// Returns [`FilterError::InvalidMetadata`] if the configuration is missing or invalid.
    pub fn to_configuration<T: serde::de::DeserializeOwned>(&self) -> Result<T, FilterError> {
        let configuration = self
            .configuration
            .clone()
            .ok_or_else(|| FilterError::InvalidMetadata(format!("{} has no configuration", self.name)))?;
        serde_json::from_value(configuration)
            .map_err(|err| FilterError::InvalidMetadata(format!("{}: {err}", self.name)))
    }
}

/// A filter error.
#[derive(Debug, Error)]
pub enum FilterError {
    /// A negative filter id.
    #[error("Invalid filter: {0}")]
    InvalidFilter(i64),
    /// An unrecognised compression id or name.
    #[error("Unknown compression: {0}")]
    UnknownCompression(String),
    /// An invalid filter option.
    #[error("invalid {filter} option: {reason}")]
    InvalidOption {
        /// The filter name.
        filter: &'static str,
        /// The reason the option is invalid.
        reason: String,
    },
    /// A filter requested without its required options.
    #[error("the {0} filter requires options")]
    MissingOption(&'static str),
    /// A filter which does not support the data type.
    #[error("the {filter} filter does not support data type {data_type}")]
    UnsupportedDataType {
        /// The filter name.
        filter: &'static str,
        /// The data type.
        data_type: String,
    },
    /// An unknown filter asked to transform chunk bytes.
    #[error("filter {0} is not available, chunk cannot be transformed")]
    UnavailableFilter(u32),
    /// A fletcher32 checksum mismatch.
    #[error("fletcher32 checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// The stored checksum.
        stored: u32,
        /// The checksum of the decoded bytes.
        computed: u32,
    },
    /// Encoded bytes which are inconsistent with the filter.
    #[error("invalid encoded chunk: {0}")]
    InvalidEncoding(String),
    /// A value that the filter cannot represent.
    #[error("{0}")]
    UnrepresentableValue(String),
    /// Invalid filter metadata.
    #[error("invalid filter metadata: {0}")]
    InvalidMetadata(String),
    /// An IO error from a compressor.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

impl FilterError {
    /// Returns the [`ErrorKind`] of the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFilter(_)
            | Self::UnknownCompression(_)
            | Self::InvalidOption { .. }
            | Self::UnrepresentableValue(_)
            | Self::InvalidMetadata(_) => ErrorKind::Value,
            Self::MissingOption(_) => ErrorKind::Configuration,
            Self::UnsupportedDataType { .. } => ErrorKind::Type,
            Self::UnavailableFilter(_)
            | Self::ChecksumMismatch { .. }
            | Self::InvalidEncoding(_)
            | Self::IOError(_) => ErrorKind::Io,
        }
    }
}

/// A compression filter requested by name or by integer id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Compression {
    /// A compression filter name, e.g. `gzip`.
    Name(String),
    /// A filter id, or a legacy gzip level.
    Id(i64),
}

impl From<&str> for Compression {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Compression {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<i64> for Compression {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

/// A scale-offset filter request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleOffsetRequest {
    /// Library determined precision (integers only).
    Auto,
    /// The number of bits for integers (0 is automatic), or the decimal scale factor for floats.
    Factor(i64),
}

/// The filters requested for a new dataset.
#[derive(Clone, Debug, Default)]
pub struct FilterRequest {
    /// The compression filter.
    pub compression: Option<Compression>,
    /// The compression options.
    pub compression_opts: Option<Vec<i64>>,
    /// Enable byte shuffling.
    pub shuffle: bool,
    /// Enable a fletcher32 checksum.
    pub fletcher32: bool,
    /// Enable the scale-offset filter.
    pub scaleoffset: Option<ScaleOffsetRequest>,
    /// Accept filter ids which are not in the filter table.
    pub allow_unknown_filter: bool,
}

/// An ordered chain of filters applied to chunk bytes.
#[derive(Clone, Debug, Default)]
pub struct FilterPipeline {
    scale_offset: Option<ScaleOffsetFilter>,
    shuffle: Option<ShuffleFilter>,
    compression: Option<Arc<dyn FilterTraits>>,
    fletcher32: Option<Fletcher32Filter>,
}

impl FilterPipeline {
    /// Create a filter pipeline from a request, validating every option against `data_type`.
    ///
    /// # Errors
    /// Returns a [`FilterError`] if a requested filter is unknown, or has invalid or missing options.
    pub fn new(
        request: &FilterRequest,
        data_type: &DataType,
        table: &FilterTable,
    ) -> Result<Self, FilterError> {
        let compression = request
            .compression
            .as_ref()
            .map(|compression| {
                table.create_compression(
                    compression,
                    request.compression_opts.as_deref(),
                    request.allow_unknown_filter,
                )
            })
            .transpose()?;
        if compression.is_none() && request.compression_opts.is_some() {
            return Err(FilterError::InvalidOption {
                filter: "compression",
                reason: "compression options given without a compression filter".to_string(),
            });
        }
        let scale_offset = request
            .scaleoffset
            .map(|scaleoffset| ScaleOffsetFilter::new(scaleoffset, data_type))
            .transpose()?;
        Ok(Self {
            scale_offset,
            shuffle: request.shuffle.then(ShuffleFilter::new),
            compression,
            fletcher32: request.fletcher32.then(Fletcher32Filter::new),
        })
    }

    /// Recreate a filter pipeline from catalog metadata.
    ///
    /// Filters with unrecognised ids are restored as [`UnknownFilter`]s.
    ///
    /// # Errors
    /// Returns a [`FilterError`] if the metadata of a known filter is invalid.
    pub fn from_metadata(
        metadata: &[FilterMetadata],
        data_type: &DataType,
    ) -> Result<Self, FilterError> {
        let mut pipeline = Self::default();
        for filter in metadata {
            match filter.id {
                FILTER_SHUFFLE => pipeline.shuffle = Some(ShuffleFilter::new()),
                FILTER_FLETCHER32 => pipeline.fletcher32 = Some(Fletcher32Filter::new()),
                FILTER_SCALEOFFSET => {
                    pipeline.scale_offset = Some(ScaleOffsetFilter::new_with_configuration(
                        &filter.to_configuration()?,
                        data_type,
                    )?);
                }
                #[cfg(feature = "gzip")]
                FILTER_GZIP => {
                    pipeline.compression = Some(Arc::new(GzipFilter::new_with_configuration(
                        &filter.to_configuration()?,
                    )));
                }
                #[cfg(feature = "lzf")]
                FILTER_LZF => pipeline.compression = Some(Arc::new(LzfFilter::new())),
                #[cfg(feature = "zstd")]
                FILTER_ZSTD => {
                    pipeline.compression = Some(Arc::new(ZstdFilter::new_with_configuration(
                        &filter.to_configuration()?,
                    )));
                }
                _ => {
                    pipeline.compression =
                        Some(Arc::new(UnknownFilter::new_with_metadata(filter)));
                }
            }
        }
        Ok(pipeline)
    }

    /// Create the catalog metadata of the pipeline, in encode order.
    #[must_use]
    pub fn metadata(&self) -> Vec<FilterMetadata> {
        self.filters().map(|filter| filter.metadata()).collect()
    }

    /// Returns the filters in encode order.
    pub fn filters(&self) -> impl Iterator<Item = &dyn FilterTraits> + '_ {
        let scale_offset = self.scale_offset.iter().map(|f| f as &dyn FilterTraits);
        let shuffle = self.shuffle.iter().map(|f| f as &dyn FilterTraits);
        let compression = self.compression.iter().map(|f| f.as_ref() as &dyn FilterTraits);
        let fletcher32 = self.fletcher32.iter().map(|f| f as &dyn FilterTraits);
        scale_offset.chain(shuffle).chain(compression).chain(fletcher32)
    }

    /// Returns true if the pipeline has no filters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters().next().is_none()
    }

    /// Returns the name of the compression filter, or its id if it is unknown.
    #[must_use]
    pub fn compression(&self) -> Option<String> {
        self.compression.as_ref().map(|f| f.name().to_string())
    }

    /// Returns the options of the compression filter.
    #[must_use]
    pub fn compression_opts(&self) -> Option<Vec<i64>> {
        self.compression.as_ref().and_then(|f| f.options())
    }

    /// Returns true if the shuffle filter is enabled.
    #[must_use]
    pub fn shuffle(&self) -> bool {
        self.shuffle.is_some()
    }

    /// Returns true if the fletcher32 filter is enabled.
    #[must_use]
    pub fn fletcher32(&self) -> bool {
        self.fletcher32.is_some()
    }

    /// Returns the scale-offset filter, if enabled.
    #[must_use]
    pub fn scaleoffset(&self) -> Option<&ScaleOffsetFilter> {
        self.scale_offset.as_ref()
    }

    /// Encode chunk bytes with every filter in order.
    ///
    /// # Errors
    /// Returns a [`FilterError`] if any filter fails to encode.
    pub fn encode(
        &self,
        bytes: Vec<u8>,
        element_size: usize,
        options: &CodecOptions,
    ) -> Result<Vec<u8>, FilterError> {
        self.filters()
            .try_fold(bytes, |bytes, filter| filter.encode(bytes, element_size, options))
    }

    /// Decode chunk bytes with every filter in reverse order.
    ///
    /// # Errors
    /// Returns a [`FilterError`] if any filter fails to decode, including checksum mismatches.
    pub fn decode(
        &self,
        bytes: Vec<u8>,
        element_size: usize,
        options: &CodecOptions,
    ) -> Result<Vec<u8>, FilterError> {
        let filters: Vec<_> = self.filters().collect();
        filters
            .into_iter()
            .rev()
            .try_fold(bytes, |bytes, filter| filter.decode(bytes, element_size, options))
    }
}

/// The gzip level requested by name without options.
fn default_gzip_level() -> i64 {
    i64::from(global_config().default_gzip_level())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(compression: impl Into<Compression>) -> FilterRequest {
        FilterRequest {
            compression: Some(compression.into()),
            ..Default::default()
        }
    }

    #[test]
    fn filter_pipeline_empty() {
        let pipeline =
            FilterPipeline::new(&FilterRequest::default(), &DataType::int32(), &FilterTable::default())
                .unwrap();
        assert!(pipeline.is_empty());
        let bytes = vec![1, 2, 3, 4];
        let options = CodecOptions::default();
        assert_eq!(pipeline.encode(bytes.clone(), 4, &options).unwrap(), bytes);
        assert_eq!(pipeline.decode(bytes.clone(), 4, &options).unwrap(), bytes);
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn filter_pipeline_order() {
        let request = FilterRequest {
            compression: Some("gzip".into()),
            compression_opts: Some(vec![9]),
            shuffle: true,
            fletcher32: true,
            scaleoffset: Some(ScaleOffsetRequest::Auto),
            allow_unknown_filter: false,
        };
        let pipeline =
            FilterPipeline::new(&request, &DataType::int16(), &FilterTable::default()).unwrap();
        let ids: Vec<u32> = pipeline.filters().map(|filter| filter.id()).collect();
        assert_eq!(
            ids,
            vec![FILTER_SCALEOFFSET, FILTER_SHUFFLE, FILTER_GZIP, FILTER_FLETCHER32]
        );
        assert_eq!(pipeline.compression().as_deref(), Some("gzip"));
        assert_eq!(pipeline.compression_opts(), Some(vec![9]));

        let elements: Vec<i16> = (-50..50).collect();
        let bytes: Vec<u8> = elements.iter().flat_map(|e| e.to_le_bytes()).collect();
        let options = CodecOptions::builder().validate_checksums(true).build();
        let encoded = pipeline.encode(bytes.clone(), 2, &options).unwrap();
        assert_eq!(pipeline.decode(encoded, 2, &options).unwrap(), bytes);
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn filter_pipeline_metadata() {
        let request = FilterRequest {
            compression: Some(Compression::Id(7)),
            shuffle: true,
            ..Default::default()
        };
        let pipeline =
            FilterPipeline::new(&request, &DataType::float64(), &FilterTable::default()).unwrap();
        let metadata = pipeline.metadata();
        let json = serde_json::to_string(&metadata).unwrap();
        let metadata: Vec<FilterMetadata> = serde_json::from_str(&json).unwrap();
        let restored = FilterPipeline::from_metadata(&metadata, &DataType::float64()).unwrap();
        assert!(restored.shuffle());
        assert!(!restored.fletcher32());
        assert_eq!(restored.compression().as_deref(), Some("gzip"));
        assert_eq!(restored.compression_opts(), Some(vec![7]));
    }

    #[test]
    fn filter_pipeline_invalid_ids() {
        let table = FilterTable::default();
        let err = FilterPipeline::new(&request(Compression::Id(-999)), &DataType::int8(), &table)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        assert!(err.to_string().contains("Invalid filter"));

        let err = FilterPipeline::new(&request(Compression::Id(100)), &DataType::int8(), &table)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        assert!(err.to_string().contains("Unknown compression"));

        let err =
            FilterPipeline::new(&request("szip"), &DataType::int8(), &table).unwrap_err();
        assert!(err.to_string().contains("Unknown compression"));

        let request = FilterRequest {
            compression_opts: Some(vec![1]),
            ..Default::default()
        };
        assert!(FilterPipeline::new(&request, &DataType::int8(), &table).is_err());
    }

    #[test]
    fn filter_pipeline_unknown_filter() {
        let request = FilterRequest {
            compression: Some(Compression::Id(256)),
            allow_unknown_filter: true,
            ..Default::default()
        };
        let pipeline =
            FilterPipeline::new(&request, &DataType::uint8(), &FilterTable::default()).unwrap();
        assert_eq!(pipeline.compression().as_deref(), Some("256"));

        let err = pipeline
            .encode(vec![1, 2, 3], 1, &CodecOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);

        let passthrough = CodecOptions::builder()
            .unknown_filter_passthrough(true)
            .build();
        assert_eq!(
            pipeline.decode(vec![1, 2, 3], 1, &passthrough).unwrap(),
            vec![1, 2, 3]
        );

        let restored =
            FilterPipeline::from_metadata(&pipeline.metadata(), &DataType::uint8()).unwrap();
        assert_eq!(restored.compression().as_deref(), Some("256"));
    }

    #[test]
    fn filter_pipeline_metadata_invalid() {
        let metadata = vec![FilterMetadata {
            id: FILTER_SCALEOFFSET,
            name: "scaleoffset".to_string(),
            configuration: None,
        }];
        let err = FilterPipeline::from_metadata(&metadata, &DataType::int32()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
    }
}
