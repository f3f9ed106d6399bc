//! The `fletcher32` checksum filter.
//!
//! Appends a 4 byte fletcher32 checksum of the chunk bytes (little-endian) on encode, and validates and strips it on decode.

use super::{CodecOptions, FilterError, FilterMetadata, FilterTraits, FILTER_FLETCHER32};

const CHECKSUM_SIZE: usize = 4;

/// The `fletcher32` filter.
#[derive(Clone, Copy, Debug, Default)]
pub struct Fletcher32Filter;

impl Fletcher32Filter {
    /// Create a new `fletcher32` filter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Compute the fletcher32 checksum over big-endian 16-bit words.
///
/// An odd trailing byte is treated as the high byte of a final word.
fn fletcher32(data: &[u8]) -> u32 {
    let mut sum1: u32 = 0;
    let mut sum2: u32 = 0;
    let mut words = data.chunks_exact(2);
    let mut remaining = data.len() / 2;
    while remaining > 0 {
        let block = remaining.min(360);
        remaining -= block;
        for word in words.by_ref().take(block) {
            sum1 += u32::from(u16::from_be_bytes([word[0], word[1]]));
            sum2 += sum1;
        }
        sum1 = (sum1 & 0xffff) + (sum1 >> 16);
        sum2 = (sum2 & 0xffff) + (sum2 >> 16);
    }
    if let [byte] = words.remainder() {
        sum1 += u32::from(*byte) << 8;
        sum2 += sum1;
        sum1 = (sum1 & 0xffff) + (sum1 >> 16);
        sum2 = (sum2 & 0xffff) + (sum2 >> 16);
    }
    sum1 = (sum1 & 0xffff) + (sum1 >> 16);
    sum2 = (sum2 & 0xffff) + (sum2 >> 16);
    (sum2 << 16) | sum1
}

impl FilterTraits for Fletcher32Filter {
    fn id(&self) -> u32 {
        FILTER_FLETCHER32
    }

    fn name(&self) -> &str {
        "fletcher32"
    }

    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::new::<()>(FILTER_FLETCHER32, self.name(), None)
    }

    fn encode(
        &self,
        mut decoded: Vec<u8>,
        _element_size: usize,
        _options: &CodecOptions,
    ) -> Result<Vec<u8>, FilterError> {
        let checksum = fletcher32(&decoded);
        decoded.extend_from_slice(&checksum.to_le_bytes());
        Ok(decoded)
    }

    fn decode(
        &self,
        mut encoded: Vec<u8>,
        _element_size: usize,
        options: &CodecOptions,
    ) -> Result<Vec<u8>, FilterError> {
        if encoded.len() < CHECKSUM_SIZE {
            return Err(FilterError::InvalidEncoding(
                "fletcher32 encoded chunk is missing its checksum".to_string(),
            ));
        }
        let data_len = encoded.len() - CHECKSUM_SIZE;
        if options.validate_checksums() {
            let mut stored = [0u8; CHECKSUM_SIZE];
            stored.copy_from_slice(&encoded[data_len..]);
            let stored = u32::from_le_bytes(stored);
            let computed = fletcher32(&encoded[..data_len]);
            if stored != computed {
                return Err(FilterError::ChecksumMismatch { stored, computed });
            }
        }
        encoded.truncate(data_len);
        Ok(encoded)
    }
}
