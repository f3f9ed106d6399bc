//! The `shuffle` filter.
//!
//! Rearranges the bytes of `n` elements of size `s` so that byte `b` of every element is contiguous.
//! Trailing bytes which do not form a whole element are left in place.

use super::{CodecOptions, FilterError, FilterMetadata, FilterTraits, FILTER_SHUFFLE};

/// The `shuffle` filter.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShuffleFilter;

impl ShuffleFilter {
    /// Create a new `shuffle` filter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn shuffle(decoded: &[u8], element_size: usize) -> Vec<u8> {
    let count = decoded.len() / element_size;
    let mut encoded = decoded.to_vec();
    for i in 0..count {
        for byte_index in 0..element_size {
            encoded[byte_index * count + i] = decoded[i * element_size + byte_index];
        }
    }
    encoded
}

fn unshuffle(encoded: &[u8], element_size: usize) -> Vec<u8> {
    let count = encoded.len() / element_size;
    let mut decoded = encoded.to_vec();
    for i in 0..count {
        for byte_index in 0..element_size {
            decoded[i * element_size + byte_index] = encoded[byte_index * count + i];
        }
    }
    decoded
}

impl FilterTraits for ShuffleFilter {
    fn id(&self) -> u32 {
        FILTER_SHUFFLE
    }

    fn name(&self) -> &str {
        "shuffle"
    }

    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::new::<()>(FILTER_SHUFFLE, self.name(), None)
    }

    fn encode(
        &self,
        decoded: Vec<u8>,
        element_size: usize,
        _options: &CodecOptions,
    ) -> Result<Vec<u8>, FilterError> {
        if element_size <= 1 {
            Ok(decoded)
        } else {
            Ok(shuffle(&decoded, element_size))
        }
    }

    fn decode(
        &self,
        encoded: Vec<u8>,
        element_size: usize,
        _options: &CodecOptions,
    ) -> Result<Vec<u8>, FilterError> {
        if element_size <= 1 {
            Ok(encoded)
        } else {
            Ok(unshuffle(&encoded, element_size))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shuffle_bytes() {
        let options = CodecOptions::default();
        let decoded: Vec<u8> = vec![0, 1, 2, 3, 4, 5, 6, 7, 8];
        let encoded = ShuffleFilter.encode(decoded.clone(), 4, &options).unwrap();
        assert_eq!(encoded, vec![0, 4, 1, 5, 2, 6, 3, 7, 8]);
        assert_eq!(ShuffleFilter.decode(encoded, 4, &options).unwrap(), decoded);
    }

    #[test]
    fn shuffle_single_byte_elements() {
        let options = CodecOptions::default();
        let decoded: Vec<u8> = (0..10).collect();
        assert_eq!(
            ShuffleFilter.encode(decoded.clone(), 1, &options).unwrap(),
            decoded
        );
    }
}
