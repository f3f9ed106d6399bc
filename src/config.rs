//! ndstore global configuration options.

use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Global configuration options for the ndstore crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
///
/// # Filter Configuration Options
///
/// ## Validate Checksums
///  > default: [`true`]
///
/// If enabled, checksum filters (e.g. `fletcher32`) will validate that decoded data matches stored checksums, otherwise validation is skipped.
///
/// ## Default Gzip Level
///  > default: `4`
///
/// The compression level of a gzip filter requested by name without an explicit level.
///
/// # Chunking Configuration Options
///
/// ## Auto Chunk Minimum Bytes
///  > default: `1048576` (1 MiB)
///
/// The lower bound of the chunk byte-size band targeted by the auto-chunk heuristic.
///
/// ## Auto Chunk Maximum Bytes
///  > default: `4194304` (4 MiB)
///
/// The upper bound of the chunk byte-size band targeted by the auto-chunk heuristic.
///
/// # Concurrency Configuration Options
///
/// ## Default Codec Concurrent Target
/// > default: [`std::thread::available_parallelism`]`()`
///
/// The default number of concurrent operations to target for `par_` dataset and multi manager methods.
/// This can be overridden for any operation with [`CodecOptions`](crate::filter::CodecOptions).
///
/// ## Default Chunk Concurrency Minimum
/// > default: `4`
///
/// For operations involving multiple chunks, this is the preferred minimum chunk concurrency.
#[derive(Debug)]
pub struct Config {
    validate_checksums: bool,
    default_gzip_level: u32,
    auto_chunk_min_bytes: u64,
    auto_chunk_max_bytes: u64,
    codec_concurrent_target: usize,
    chunk_concurrent_minimum: usize,
}

impl Default for Config {
    fn default() -> Self {
        let codec_concurrent_target =
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        Config {
            validate_checksums: true,
            default_gzip_level: 4,
            auto_chunk_min_bytes: 1024 * 1024,
            auto_chunk_max_bytes: 4 * 1024 * 1024,
            codec_concurrent_target,
            chunk_concurrent_minimum: 4,
        }
    }
}

impl Config {
    /// Get the [validate checksums](#validate-checksums) configuration.
    #[must_use]
    pub fn validate_checksums(&self) -> bool {
        self.validate_checksums
    }

    /// Set the [validate checksums](#validate-checksums) configuration.
    pub fn set_validate_checksums(&mut self, validate_checksums: bool) {
        self.validate_checksums = validate_checksums;
    }

    /// Get the [default gzip level](#default-gzip-level) configuration.
    #[must_use]
    pub fn default_gzip_level(&self) -> u32 {
        self.default_gzip_level
    }

    /// Set the [default gzip level](#default-gzip-level) configuration.
    pub fn set_default_gzip_level(&mut self, level: u32) {
        self.default_gzip_level = level;
    }

    /// Get the [auto chunk minimum bytes](#auto-chunk-minimum-bytes) configuration.
    #[must_use]
    pub fn auto_chunk_min_bytes(&self) -> u64 {
        self.auto_chunk_min_bytes
    }

    /// Set the [auto chunk minimum bytes](#auto-chunk-minimum-bytes) configuration.
    pub fn set_auto_chunk_min_bytes(&mut self, min_bytes: u64) {
        self.auto_chunk_min_bytes = min_bytes;
    }

    /// Get the [auto chunk maximum bytes](#auto-chunk-maximum-bytes) configuration.
    #[must_use]
    pub fn auto_chunk_max_bytes(&self) -> u64 {
        self.auto_chunk_max_bytes
    }

    /// Set the [auto chunk maximum bytes](#auto-chunk-maximum-bytes) configuration.
    pub fn set_auto_chunk_max_bytes(&mut self, max_bytes: u64) {
        self.auto_chunk_max_bytes = max_bytes;
    }

    /// Get the [default codec concurrent target](#default-codec-concurrent-target) configuration.
    #[must_use]
    pub fn codec_concurrent_target(&self) -> usize {
        self.codec_concurrent_target
    }

    /// Set the [default codec concurrent target](#default-codec-concurrent-target) configuration.
    pub fn set_codec_concurrent_target(&mut self, concurrent_target: usize) {
        self.codec_concurrent_target = concurrent_target;
    }

    /// Get the [default chunk concurrent minimum](#default-chunk-concurrency-minimum) configuration.
    #[must_use]
    pub fn chunk_concurrent_minimum(&self) -> usize {
        self.chunk_concurrent_minimum
    }

    /// Set the [default chunk concurrent minimum](#default-chunk-concurrency-minimum) configuration.
    pub fn set_chunk_concurrent_minimum(&mut self, concurrent_minimum: usize) {
        self.chunk_concurrent_minimum = concurrent_minimum;
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global ndstore configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .read()
        .unwrap()
}

/// Returns a mutable reference to the global ndstore configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .write()
        .unwrap()
}
