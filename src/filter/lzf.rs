//! The `lzf` compression filter.
//!
//! Encoded chunks start with a one byte marker and the decoded length as a little-endian `u64`.
//! Chunks which `lzf` cannot shrink are stored uncompressed after the header.

use super::{CodecOptions, FilterError, FilterMetadata, FilterTraits, FILTER_LZF};

const HEADER_SIZE: usize = 9;
const MARKER_RAW: u8 = 0;
const MARKER_COMPRESSED: u8 = 1;

/// The `lzf` filter.
#[derive(Clone, Copy, Debug, Default)]
pub struct LzfFilter;

impl LzfFilter {
    /// Create a new `lzf` filter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl FilterTraits for LzfFilter {
    fn id(&self) -> u32 {
        FILTER_LZF
    }

    fn name(&self) -> &str {
        "lzf"
    }

    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::new::<()>(FILTER_LZF, self.name(), None)
    }

    fn encode(
        &self,
        decoded: Vec<u8>,
        _element_size: usize,
        _options: &CodecOptions,
    ) -> Result<Vec<u8>, FilterError> {
        let decoded_len = decoded.len() as u64;
        let (marker, payload) = match lzf::compress(&decoded) {
            Ok(compressed) if compressed.len() < decoded.len() => (MARKER_COMPRESSED, compressed),
            _ => (MARKER_RAW, decoded),
        };
        let mut encoded = Vec::with_capacity(HEADER_SIZE + payload.len());
        encoded.push(marker);
        encoded.extend_from_slice(&decoded_len.to_le_bytes());
        encoded.extend_from_slice(&payload);
        Ok(encoded)
    }

    fn decode(
        &self,
        encoded: Vec<u8>,
        _element_size: usize,
        _options: &CodecOptions,
    ) -> Result<Vec<u8>, FilterError> {
        if encoded.len() < HEADER_SIZE {
            return Err(FilterError::InvalidEncoding(format!(
                "lzf chunk of {} bytes is shorter than its header",
                encoded.len()
            )));
        }
        let (header, payload) = encoded.split_at(HEADER_SIZE);
        let mut length = [0u8; 8];
        length.copy_from_slice(&header[1..]);
        let decoded_len = usize::try_from(u64::from_le_bytes(length))
            .map_err(|_| FilterError::InvalidEncoding("lzf decoded length overflows".to_string()))?;
        match header[0] {
            MARKER_RAW if payload.len() == decoded_len => Ok(payload.to_vec()),
            MARKER_COMPRESSED => {
                let decoded = lzf::decompress(payload, decoded_len).map_err(|err| {
                    FilterError::InvalidEncoding(format!("lzf decompression failed: {err:?}"))
                })?;
                if decoded.len() == decoded_len {
                    Ok(decoded)
                } else {
                    Err(FilterError::InvalidEncoding(format!(
                        "lzf chunk decoded to {} bytes, expected {decoded_len}",
                        decoded.len()
                    )))
                }
            }
            marker => Err(FilterError::InvalidEncoding(format!(
                "invalid lzf chunk marker {marker} for {} payload bytes",
                payload.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ErrorKind;

    use super::*;

    #[test]
    fn lzf_round_trip() {
        let options = CodecOptions::default();
        let bytes: Vec<u8> = (0..4096u32).flat_map(|e| (e % 16).to_le_bytes()).collect();
        let encoded = LzfFilter::new().encode(bytes.clone(), 4, &options).unwrap();
        assert_eq!(encoded[0], MARKER_COMPRESSED);
        assert!(encoded.len() < bytes.len());
        assert_eq!(LzfFilter::new().decode(encoded, 4, &options).unwrap(), bytes);
    }

    #[test]
    fn lzf_incompressible() {
        let options = CodecOptions::default();
        for bytes in [vec![], vec![7u8], vec![1, 2, 3, 4, 5]] {
            let encoded = LzfFilter::new().encode(bytes.clone(), 1, &options).unwrap();
            assert_eq!(encoded[0], MARKER_RAW);
            assert_eq!(LzfFilter::new().decode(encoded, 1, &options).unwrap(), bytes);
        }
    }

    #[test]
    fn lzf_corrupt() {
        let options = CodecOptions::default();
        let err = LzfFilter::new()
            .decode(vec![1, 2, 3], 1, &options)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        let err = LzfFilter::new()
            .decode(vec![2, 0, 0, 0, 0, 0, 0, 0, 0], 1, &options)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        let err = LzfFilter::new()
            .decode(vec![0, 4, 0, 0, 0, 0, 0, 0, 0, 1], 1, &options)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
