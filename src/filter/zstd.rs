//! The `zstd` compression filter.

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use zstd::zstd_safe;

use super::{CodecOptions, FilterError, FilterMetadata, FilterTraits, FILTER_ZSTD};

/// A wrapper to handle various versions of `zstd` filter configuration parameters.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Display, From)]
#[serde(untagged)]
pub enum ZstdFilterConfiguration {
    /// Version 1.0.
    V1(ZstdFilterConfigurationV1),
}

/// Configuration parameters for the `zstd` filter (version 1.0).
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Display)]
#[serde(deny_unknown_fields)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct ZstdFilterConfigurationV1 {
    /// The compression level, from -7 to 22.
    pub level: zstd_safe::CompressionLevel,
}

/// The `zstd` filter.
#[derive(Clone, Debug)]
pub struct ZstdFilter {
    compression: zstd_safe::CompressionLevel,
}

/// The default `zstd` level when requested by name without options.
pub(crate) const DEFAULT_ZSTD_LEVEL: i64 = 3;

impl ZstdFilter {
    /// Create a new `zstd` filter.
    ///
    /// # Errors
    /// Returns [`FilterError::InvalidOption`] if `level` is not between -7 and 22.
    pub fn new(level: i64) -> Result<Self, FilterError> {
        match zstd_safe::CompressionLevel::try_from(level) {
            Ok(compression) if (-7..=22).contains(&compression) => Ok(Self { compression }),
            _ => Err(FilterError::InvalidOption {
                filter: "zstd",
                reason: format!("compression level {level} must be between -7 and 22"),
            }),
        }
    }

    /// Create a new `zstd` filter from configuration.
    #[must_use]
    pub const fn new_with_configuration(configuration: &ZstdFilterConfiguration) -> Self {
        let ZstdFilterConfiguration::V1(configuration) = configuration;
        Self {
            compression: configuration.level,
        }
    }
}

impl FilterTraits for ZstdFilter {
    fn id(&self) -> u32 {
        FILTER_ZSTD
    }

    fn name(&self) -> &str {
        "zstd"
    }

    fn options(&self) -> Option<Vec<i64>> {
        Some(vec![i64::from(self.compression)])
    }

    fn metadata(&self) -> FilterMetadata {
        let configuration = ZstdFilterConfiguration::V1(ZstdFilterConfigurationV1 {
            level: self.compression,
        });
        FilterMetadata::new(FILTER_ZSTD, self.name(), Some(&configuration))
    }

    fn encode(
        &self,
        decoded: Vec<u8>,
        _element_size: usize,
        _options: &CodecOptions,
    ) -> Result<Vec<u8>, FilterError> {
        zstd::encode_all(decoded.as_slice(), self.compression).map_err(FilterError::IOError)
    }

    fn decode(
        &self,
        encoded: Vec<u8>,
        _element_size: usize,
        _options: &CodecOptions,
    ) -> Result<Vec<u8>, FilterError> {
        zstd::decode_all(encoded.as_slice()).map_err(FilterError::IOError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zstd_round_trip() {
        let options = CodecOptions::default();
        let bytes: Vec<u8> = (0..1000u32).flat_map(|e| (e % 7).to_le_bytes()).collect();
        let filter = ZstdFilter::new(5).unwrap();
        let encoded = filter.encode(bytes.clone(), 4, &options).unwrap();
        assert!(encoded.len() < bytes.len());
        assert_eq!(filter.decode(encoded, 4, &options).unwrap(), bytes);

        let metadata = filter.metadata();
        let configuration: ZstdFilterConfiguration = metadata.to_configuration().unwrap();
        assert_eq!(
            configuration,
            ZstdFilterConfiguration::V1(ZstdFilterConfigurationV1 { level: 5 })
        );
    }

    #[test]
    fn zstd_invalid_level() {
        assert!(ZstdFilter::new(23).is_err());
        assert!(ZstdFilter::new(-8).is_err());
        assert!(ZstdFilter::new(-7).is_ok());
    }
}
