//! The table of compression filters available to new pipelines.

use std::sync::Arc;

use super::{Compression, FilterError, FilterTraits, UnknownFilter};
#[cfg(feature = "gzip")]
use super::{default_gzip_level, GzipFilter, FILTER_GZIP};
#[cfg(feature = "lzf")]
use super::{LzfFilter, FILTER_LZF};
#[cfg(feature = "zstd")]
use super::{zstd::DEFAULT_ZSTD_LEVEL, ZstdFilter, FILTER_ZSTD};

/// An immutable table of compression filter names and ids.
///
/// The table also holds the legacy integer compression values which are interpreted as a gzip level.
/// [`FilterTable::default`] contains every compression filter compiled into the crate, and legacy levels `0..=9`.
#[derive(Clone, Debug)]
pub struct FilterTable {
    compressions: Vec<(&'static str, u32)>,
    legacy_gzip_levels: Vec<i64>,
}

impl Default for FilterTable {
    fn default() -> Self {
        let mut compressions = Vec::new();
        #[cfg(feature = "gzip")]
        compressions.push(("gzip", FILTER_GZIP));
        #[cfg(feature = "lzf")]
        compressions.push(("lzf", FILTER_LZF));
        #[cfg(feature = "zstd")]
        compressions.push(("zstd", FILTER_ZSTD));
        let legacy_gzip_levels = if cfg!(feature = "gzip") {
            (0..=9).collect()
        } else {
            Vec::new()
        };
        Self {
            compressions,
            legacy_gzip_levels,
        }
    }
}

impl FilterTable {
    /// Return a table without legacy integer gzip levels.
    ///
    /// Integer compression values are then always interpreted as filter ids.
    #[must_use]
    pub fn without_legacy_gzip_levels(self) -> Self {
        self.with_legacy_gzip_levels([])
    }

    /// Return a table with the given legacy integer gzip levels.
    #[must_use]
    pub fn with_legacy_gzip_levels(mut self, levels: impl IntoIterator<Item = i64>) -> Self {
        self.legacy_gzip_levels = levels.into_iter().collect();
        self
    }

    /// Returns the id of the compression filter `name`.
    #[must_use]
    pub fn compression_id(&self, name: &str) -> Option<u32> {
        self.compressions
            .iter()
            .find_map(|(n, id)| (*n == name).then_some(*id))
    }

    /// Returns the name of the compression filter with `id`.
    #[must_use]
    pub fn compression_name(&self, id: u32) -> Option<&'static str> {
        self.compressions
            .iter()
            .find_map(|(name, i)| (*i == id).then_some(*name))
    }

    /// Returns true if `value` is a legacy gzip level.
    #[must_use]
    pub fn is_legacy_gzip_level(&self, value: i64) -> bool {
        self.legacy_gzip_levels.contains(&value)
    }

    /// Create the compression filter for a request.
    pub(crate) fn create_compression(
        &self,
        compression: &Compression,
        options: Option<&[i64]>,
        allow_unknown_filter: bool,
    ) -> Result<Arc<dyn FilterTraits>, FilterError> {
        match compression {
            Compression::Name(name) => {
                let id = self
                    .compression_id(name)
                    .ok_or_else(|| FilterError::UnknownCompression(name.clone()))?;
                self.create_known(id, options, true)
            }
            Compression::Id(id) if *id < 0 => Err(FilterError::InvalidFilter(*id)),
            Compression::Id(level) if self.is_legacy_gzip_level(*level) => {
                if options.is_some() {
                    return Err(FilterError::InvalidOption {
                        filter: "gzip",
                        reason: "a legacy gzip level conflicts with compression options"
                            .to_string(),
                    });
                }
                self.compression_id("gzip")
                    .ok_or_else(|| FilterError::UnknownCompression("gzip".to_string()))
                    .and_then(|gzip| self.create_known(gzip, Some(&[*level]), false))
            }
            Compression::Id(id) => {
                let known = u32::try_from(*id)
                    .ok()
                    .filter(|id| self.compression_name(*id).is_some());
                let unknown = u32::try_from(*id).ok().filter(|_| allow_unknown_filter);
                match (known, unknown) {
                    (Some(id), _) => self.create_known(id, options, false),
                    (None, Some(id)) => Ok(Arc::new(UnknownFilter::new(
                        id,
                        options.map(<[i64]>::to_vec).unwrap_or_default(),
                    ))),
                    (None, None) => Err(FilterError::UnknownCompression(id.to_string())),
                }
            }
        }
    }

    #[allow(unused_variables)]
    fn create_known(
        &self,
        id: u32,
        options: Option<&[i64]>,
        by_name: bool,
    ) -> Result<Arc<dyn FilterTraits>, FilterError> {
        match id {
            #[cfg(feature = "gzip")]
            FILTER_GZIP => {
                let level = match options {
                    Some(&[level]) => level,
                    Some(_) => return Err(single_option_error("gzip")),
                    None if by_name => default_gzip_level(),
                    None => return Err(FilterError::MissingOption("gzip")),
                };
                Ok(Arc::new(GzipFilter::new(level)?))
            }
            #[cfg(feature = "lzf")]
            FILTER_LZF => match options {
                None | Some([]) => Ok(Arc::new(LzfFilter::new())),
                Some(_) => Err(FilterError::InvalidOption {
                    filter: "lzf",
                    reason: "lzf takes no compression options".to_string(),
                }),
            },
            #[cfg(feature = "zstd")]
            FILTER_ZSTD => {
                let level = match options {
                    Some(&[level]) => level,
                    Some(_) => return Err(single_option_error("zstd")),
                    None => DEFAULT_ZSTD_LEVEL,
                };
                Ok(Arc::new(ZstdFilter::new(level)?))
            }
            _ => Err(FilterError::UnknownCompression(id.to_string())),
        }
    }
}

#[allow(dead_code)]
fn single_option_error(filter: &'static str) -> FilterError {
    FilterError::InvalidOption {
        filter,
        reason: "expected a single compression level".to_string(),
    }
}
