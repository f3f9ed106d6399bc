//! The `gzip` (deflate) compression filter.

use std::io::{Cursor, Read};

use derive_more::{Display, From};
use flate2::bufread::{GzDecoder, GzEncoder};
use serde::{Deserialize, Serialize};

use super::{CodecOptions, FilterError, FilterMetadata, FilterTraits, FILTER_GZIP};

/// A wrapper to handle various versions of `gzip` filter configuration parameters.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Display, From)]
#[serde(untagged)]
pub enum GzipFilterConfiguration {
    /// Version 1.0.
    V1(GzipFilterConfigurationV1),
}

/// Configuration parameters for the `gzip` filter (version 1.0).
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Display)]
#[serde(deny_unknown_fields)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct GzipFilterConfigurationV1 {
    /// The compression level.
    pub level: GzipCompressionLevel,
}

/// A gzip compression level, an integer from 0 to 9.
///
/// A level of 1 is the fastest compression method and produces the least compression, while 9 is slowest and produces the most compression.
/// Compression is turned off completely when level is 0.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub struct GzipCompressionLevel(u32);

impl TryFrom<i64> for GzipCompressionLevel {
    type Error = FilterError;

    fn try_from(level: i64) -> Result<Self, Self::Error> {
        match u32::try_from(level) {
            Ok(level) if level < 10 => Ok(Self(level)),
            _ => Err(FilterError::InvalidOption {
                filter: "gzip",
                reason: format!("compression level {level} must be between 0 and 9"),
            }),
        }
    }
}

impl serde::Serialize for GzipCompressionLevel {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u32(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for GzipCompressionLevel {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let level = i64::deserialize(d)?;
        Self::try_from(level).map_err(serde::de::Error::custom)
    }
}

impl GzipCompressionLevel {
    /// The underlying integer compression level.
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

/// The `gzip` filter.
#[derive(Clone, Debug)]
pub struct GzipFilter {
    compression_level: GzipCompressionLevel,
}

impl GzipFilter {
    /// Create a new `gzip` filter.
    ///
    /// # Errors
    /// Returns [`FilterError::InvalidOption`] if `compression_level` is not between 0 and 9.
    pub fn new(compression_level: i64) -> Result<Self, FilterError> {
        Ok(Self {
            compression_level: compression_level.try_into()?,
        })
    }

    /// Create a new `gzip` filter from configuration.
    #[must_use]
    pub const fn new_with_configuration(configuration: &GzipFilterConfiguration) -> Self {
        let GzipFilterConfiguration::V1(configuration) = configuration;
        Self {
            compression_level: configuration.level,
        }
    }
}

impl FilterTraits for GzipFilter {
    fn id(&self) -> u32 {
        FILTER_GZIP
    }

    fn name(&self) -> &str {
        "gzip"
    }

    fn options(&self) -> Option<Vec<i64>> {
        Some(vec![i64::from(self.compression_level.as_u32())])
    }

    fn metadata(&self) -> FilterMetadata {
        let configuration = GzipFilterConfiguration::V1(GzipFilterConfigurationV1 {
            level: self.compression_level,
        });
        FilterMetadata::new(FILTER_GZIP, self.name(), Some(&configuration))
    }

    fn encode(
        &self,
        decoded: Vec<u8>,
        _element_size: usize,
        _options: &CodecOptions,
    ) -> Result<Vec<u8>, FilterError> {
        let mut encoder = GzEncoder::new(
            Cursor::new(decoded),
            flate2::Compression::new(self.compression_level.as_u32()),
        );
        let mut out: Vec<u8> = Vec::new();
        encoder.read_to_end(&mut out)?;
        Ok(out)
    }

    fn decode(
        &self,
        encoded: Vec<u8>,
        _element_size: usize,
        _options: &CodecOptions,
    ) -> Result<Vec<u8>, FilterError> {
        let mut decoder = GzDecoder::new(Cursor::new(encoded));
        let mut out: Vec<u8> = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}
