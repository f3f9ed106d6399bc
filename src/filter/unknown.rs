//! Filters outside the filter table.

use log::warn;
use serde::{Deserialize, Serialize};

use super::{CodecOptions, FilterError, FilterMetadata, FilterTraits};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
struct UnknownFilterConfiguration {
    #[serde(default)]
    options: Vec<i64>,
}

/// A filter whose id is not in the filter table.
///
/// The filter is recorded in dataset metadata but cannot encode or decode chunks.
/// With [`CodecOptions::unknown_filter_passthrough`] enabled, chunk bytes pass through unchanged.
#[derive(Clone, Debug)]
pub struct UnknownFilter {
    id: u32,
    name: String,
    options: Vec<i64>,
}

impl UnknownFilter {
    /// Create a new unknown filter.
    #[must_use]
    pub fn new(id: u32, options: Vec<i64>) -> Self {
        Self {
            id,
            name: id.to_string(),
            options,
        }
    }

    /// Recreate an unknown filter from its metadata.
    #[must_use]
    pub fn new_with_metadata(metadata: &FilterMetadata) -> Self {
        let configuration = metadata
            .to_configuration::<UnknownFilterConfiguration>()
            .unwrap_or_default();
        Self {
            id: metadata.id,
            name: metadata.name.clone(),
            options: configuration.options,
        }
    }

    fn passthrough(&self, bytes: Vec<u8>, options: &CodecOptions) -> Result<Vec<u8>, FilterError> {
        if options.unknown_filter_passthrough() {
            warn!(
                "filter {} is not available, passing {} chunk bytes through unchanged",
                self.id,
                bytes.len()
            );
            Ok(bytes)
        } else {
            Err(FilterError::UnavailableFilter(self.id))
        }
    }
}

impl FilterTraits for UnknownFilter {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn options(&self) -> Option<Vec<i64>> {
        (!self.options.is_empty()).then(|| self.options.clone())
    }

    fn metadata(&self) -> FilterMetadata {
        let configuration = UnknownFilterConfiguration {
            options: self.options.clone(),
        };
        FilterMetadata::new(self.id, &self.name, Some(&configuration))
    }

    fn encode(
        &self,
        decoded: Vec<u8>,
        _element_size: usize,
        options: &CodecOptions,
    ) -> Result<Vec<u8>, FilterError> {
        self.passthrough(decoded, options)
    }

    fn decode(
        &self,
        encoded: Vec<u8>,
        _element_size: usize,
        options: &CodecOptions,
    ) -> Result<Vec<u8>, FilterError> {
        self.passthrough(encoded, options)
    }
}
