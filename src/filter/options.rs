//! Options for encoding and decoding chunks.

use crate::config::global_config;

/// Options for encoding/decoding chunks.
///
/// Defaults are taken from the [global configuration](crate::config::global_config).
#[derive(Debug, Clone)]
pub struct CodecOptions {
    concurrent_target: usize,
    validate_checksums: bool,
    unknown_filter_passthrough: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        CodecOptionsBuilder::new().build()
    }
}

impl CodecOptions {
    /// Create a new codec options builder.
    #[must_use]
    pub fn builder() -> CodecOptionsBuilder {
        CodecOptionsBuilder::new()
    }

    /// Return the concurrent target.
    #[must_use]
    pub fn concurrent_target(&self) -> usize {
        self.concurrent_target
    }

    /// Set the concurrent target.
    pub fn set_concurrent_target(&mut self, concurrent_target: usize) {
        self.concurrent_target = concurrent_target;
    }

    /// Return true if checksums are validated on decode.
    #[must_use]
    pub fn validate_checksums(&self) -> bool {
        self.validate_checksums
    }

    /// Set whether checksums are validated on decode.
    pub fn set_validate_checksums(&mut self, validate_checksums: bool) {
        self.validate_checksums = validate_checksums;
    }

    /// Return true if unknown filters pass chunk bytes through unchanged instead of failing.
    #[must_use]
    pub fn unknown_filter_passthrough(&self) -> bool {
        self.unknown_filter_passthrough
    }

    /// Set whether unknown filters pass chunk bytes through unchanged.
    pub fn set_unknown_filter_passthrough(&mut self, unknown_filter_passthrough: bool) {
        self.unknown_filter_passthrough = unknown_filter_passthrough;
    }
}

/// Builder for [`CodecOptions`].
#[derive(Debug, Clone)]
pub struct CodecOptionsBuilder {
    concurrent_target: usize,
    validate_checksums: bool,
    unknown_filter_passthrough: bool,
}

impl Default for CodecOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecOptionsBuilder {
    /// Create a new codec options builder.
    #[must_use]
    pub fn new() -> Self {
        let config = global_config();
        Self {
            concurrent_target: config.codec_concurrent_target(),
            validate_checksums: config.validate_checksums(),
            unknown_filter_passthrough: false,
        }
    }

    /// Build into codec options.
    #[must_use]
    pub fn build(&self) -> CodecOptions {
        CodecOptions {
            concurrent_target: self.concurrent_target,
            validate_checksums: self.validate_checksums,
            unknown_filter_passthrough: self.unknown_filter_passthrough,
        }
    }

    /// Set the concurrent target for parallel operations.
    #[must_use]
    pub fn concurrent_target(mut self, concurrent_target: usize) -> Self {
        self.concurrent_target = concurrent_target;
        self
    }

    /// Set whether checksums are validated on decode.
    #[must_use]
    pub fn validate_checksums(mut self, validate_checksums: bool) -> Self {
        self.validate_checksums = validate_checksums;
        self
    }

    /// Set whether unknown filters pass chunk bytes through unchanged.
    #[must_use]
    pub fn unknown_filter_passthrough(mut self, unknown_filter_passthrough: bool) -> Self {
        self.unknown_filter_passthrough = unknown_filter_passthrough;
        self
    }
}
