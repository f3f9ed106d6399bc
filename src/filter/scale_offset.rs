//! The `scaleoffset` filter.
//!
//! Integers are stored as offsets from the chunk minimum, packed into the fewest bits that cover the chunk range.
//! A requested bit width narrower than the range is lossy: the high bits of each offset are discarded.
//!
//! Floats are quantised to `round(v * 10^d)` for a decimal scale factor `d` and then packed as integers,
//! so decoded values are within `10^-d` of the originals.
//!
//! Encoded layout: `kind: u8`, `nbits: u8`, `minimum: 8 bytes (LE)`, `count: u64 (LE)`, then the offsets packed LSB-first.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use derive_more::{Display, From};
use half::f16;
use serde::{Deserialize, Serialize};

use crate::data_type::DataType;

use super::{
    CodecOptions, FilterError, FilterMetadata, FilterTraits, ScaleOffsetRequest, FILTER_SCALEOFFSET,
};

const HEADER_SIZE: usize = 18;
const KIND_INTEGER: u8 = 0;
const KIND_FLOAT: u8 = 1;
const MAX_DECIMAL_SCALE: u32 = 18;

/// A wrapper to handle various versions of `scaleoffset` filter configuration parameters.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Display, From)]
#[serde(untagged)]
pub enum ScaleOffsetFilterConfiguration {
    /// Version 1.0.
    V1(ScaleOffsetFilterConfigurationV1),
}

/// Configuration parameters for the `scaleoffset` filter (version 1.0).
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Display)]
#[serde(deny_unknown_fields)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct ScaleOffsetFilterConfigurationV1 {
    /// The scale-offset mode.
    pub mode: ScaleOffsetMode,
}

/// The scale-offset mode of a data type class.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScaleOffsetMode {
    /// Integer packing with a fixed bit width, or automatic if 0.
    Integer {
        /// The number of bits per element.
        min_bits: u32,
    },
    /// Decimal quantisation of floats.
    Float {
        /// The number of decimal digits retained.
        decimal_scale: u32,
    },
}

/// The `scaleoffset` filter.
#[derive(Clone, Debug)]
pub struct ScaleOffsetFilter {
    mode: ScaleOffsetMode,
    data_type: DataType,
}

fn invalid_option(reason: impl Into<String>) -> FilterError {
    FilterError::InvalidOption {
        filter: "scaleoffset",
        reason: reason.into(),
    }
}

impl ScaleOffsetFilter {
    /// Create a new `scaleoffset` filter for `data_type`.
    ///
    /// # Errors
    /// Returns a [`FilterError`] if
    ///  - `data_type` is not an integer or float,
    ///  - the factor is negative or too large, or
    ///  - `data_type` is a float and no explicit factor is given.
    pub fn new(request: ScaleOffsetRequest, data_type: &DataType) -> Result<Self, FilterError> {
        let mode = match (data_type, request) {
            (_, ScaleOffsetRequest::Factor(factor)) if factor < 0 => {
                return Err(invalid_option(format!("factor {factor} is negative")));
            }
            (DataType::Integer { .. }, ScaleOffsetRequest::Auto) => {
                ScaleOffsetMode::Integer { min_bits: 0 }
            }
            (DataType::Integer { width, .. }, ScaleOffsetRequest::Factor(bits)) => {
                match u32::try_from(bits) {
                    Ok(min_bits) if u64::from(min_bits) <= (*width as u64) * 8 => {
                        ScaleOffsetMode::Integer { min_bits }
                    }
                    _ => {
                        return Err(invalid_option(format!(
                            "{bits} bits exceeds the width of {data_type}"
                        )))
                    }
                }
            }
            (DataType::Float { .. }, ScaleOffsetRequest::Auto) => {
                return Err(invalid_option(
                    "floating point data requires an explicit scale factor",
                ));
            }
            (DataType::Float { .. }, ScaleOffsetRequest::Factor(scale)) => {
                match u32::try_from(scale) {
                    Ok(decimal_scale) if decimal_scale <= MAX_DECIMAL_SCALE => {
                        ScaleOffsetMode::Float { decimal_scale }
                    }
                    _ => {
                        return Err(invalid_option(format!(
                            "scale factor {scale} exceeds {MAX_DECIMAL_SCALE}"
                        )))
                    }
                }
            }
            _ => {
                return Err(FilterError::UnsupportedDataType {
                    filter: "scaleoffset",
                    data_type: data_type.to_string(),
                })
            }
        };
        Ok(Self {
            mode,
            data_type: data_type.clone(),
        })
    }

    /// Create a new `scaleoffset` filter from configuration.
    ///
    /// # Errors
    /// Returns [`FilterError::InvalidMetadata`] if the configuration mode does not match `data_type`.
    pub fn new_with_configuration(
        configuration: &ScaleOffsetFilterConfiguration,
        data_type: &DataType,
    ) -> Result<Self, FilterError> {
        let ScaleOffsetFilterConfiguration::V1(configuration) = configuration;
        let request = match configuration.mode {
            ScaleOffsetMode::Integer { min_bits } => i64::from(min_bits),
            ScaleOffsetMode::Float { decimal_scale } => i64::from(decimal_scale),
        };
        let filter = Self::new(ScaleOffsetRequest::Factor(request), data_type)
            .map_err(|err| FilterError::InvalidMetadata(err.to_string()))?;
        if filter.mode == configuration.mode {
            Ok(filter)
        } else {
            Err(FilterError::InvalidMetadata(format!(
                "scaleoffset mode {:?} does not match data type {data_type}",
                configuration.mode
            )))
        }
    }

    /// Returns the scale-offset mode.
    #[must_use]
    pub fn mode(&self) -> ScaleOffsetMode {
        self.mode
    }

    /// Returns the number of bits (integers, 0 if automatic) or the decimal scale factor (floats).
    #[must_use]
    pub fn factor(&self) -> u32 {
        match self.mode {
            ScaleOffsetMode::Integer { min_bits } => min_bits,
            ScaleOffsetMode::Float { decimal_scale } => decimal_scale,
        }
    }

    fn width(&self) -> usize {
        self.data_type.fixed_size().unwrap_or(1)
    }

    fn scale(decimal_scale: u32) -> f64 {
        10f64.powi(i32::try_from(decimal_scale).unwrap_or(i32::MAX))
    }

    /// Read the elements of `bytes` as integers.
    fn read_integers(&self, bytes: &[u8]) -> Vec<i128> {
        let width = self.width();
        let signed = matches!(self.data_type, DataType::Integer { signed: true, .. });
        bytes
            .chunks_exact(width)
            .map(|element| {
                let mut buf = [0u8; 8];
                buf[..width].copy_from_slice(element);
                let unsigned = u64::from_le_bytes(buf);
                if signed {
                    let shift = 64 - 8 * width;
                    i128::from((unsigned << shift) as i64 >> shift)
                } else {
                    i128::from(unsigned)
                }
            })
            .collect()
    }

    /// Quantise a float element with `scale`.
    fn quantise(element: &[u8], scale: f64) -> Result<i128, FilterError> {
        let value = match element {
            [a, b] => f16::from_le_bytes([*a, *b]).to_f64(),
            [a, b, c, d] => f64::from(f32::from_le_bytes([*a, *b, *c, *d])),
            _ => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(element);
                f64::from_le_bytes(buf)
            }
        };
        let quantised = (value * scale).round();
        if quantised.is_finite() && quantised.abs() < 4.0e18 {
            Ok(i128::from(quantised as i64))
        } else {
            Err(FilterError::UnrepresentableValue(format!(
                "{value} cannot be quantised by the scaleoffset filter"
            )))
        }
    }

    /// Read the elements of `bytes` as floats, quantised with `decimal_scale`.
    fn read_floats(&self, bytes: &[u8], decimal_scale: u32) -> Result<Vec<i128>, FilterError> {
        let scale = Self::scale(decimal_scale);
        bytes
            .chunks_exact(self.width())
            .map(|element| Self::quantise(element, scale))
            .collect()
    }

    /// Check that every element of `bytes` can be encoded.
    ///
    /// Integers are always representable.
    ///
    /// # Errors
    /// Returns [`FilterError::UnrepresentableValue`] if a float element is not finite or is out of range once scaled.
    pub fn check_representable(&self, bytes: &[u8]) -> Result<(), FilterError> {
        match self.mode {
            ScaleOffsetMode::Integer { .. } => Ok(()),
            ScaleOffsetMode::Float { decimal_scale } => {
                let scale = Self::scale(decimal_scale);
                bytes
                    .chunks_exact(self.width())
                    .try_for_each(|element| Self::quantise(element, scale).map(|_| ()))
            }
        }
    }

    fn write_element(&self, value: i128, out: &mut Vec<u8>) {
        let width = self.width();
        match self.mode {
            ScaleOffsetMode::Integer { .. } => {
                let bits = value as u64;
                out.extend_from_slice(&bits.to_le_bytes()[..width]);
            }
            ScaleOffsetMode::Float { decimal_scale } => {
                let value = value as f64 / Self::scale(decimal_scale);
                match width {
                    2 => out.extend_from_slice(&f16::from_f64(value).to_le_bytes()),
                    4 => out.extend_from_slice(&(value as f32).to_le_bytes()),
                    _ => out.extend_from_slice(&value.to_le_bytes()),
                }
            }
        }
    }
}

/// The number of bits needed to represent `span`.
fn bits_needed(span: u128) -> u32 {
    128 - span.leading_zeros()
}

fn mask(nbits: u32) -> u64 {
    if nbits >= 64 {
        u64::MAX
    } else {
        (1u64 << nbits) - 1
    }
}

struct BitWriter {
    bytes: Vec<u8>,
    bit: usize,
}

impl BitWriter {
    fn push(&mut self, value: u64, nbits: u32) {
        for i in 0..nbits {
            if self.bit % 8 == 0 {
                self.bytes.push(0);
            }
            if (value >> i) & 1 == 1 {
                let last = self.bytes.len() - 1;
                self.bytes[last] |= 1 << (self.bit % 8);
            }
            self.bit += 1;
        }
    }
}

fn read_bits(bytes: &[u8], start_bit: usize, nbits: u32) -> u64 {
    let mut value = 0u64;
    for i in 0..nbits as usize {
        let bit = start_bit + i;
        if (bytes[bit / 8] >> (bit % 8)) & 1 == 1 {
            value |= 1 << i;
        }
    }
    value
}

impl FilterTraits for ScaleOffsetFilter {
    fn id(&self) -> u32 {
        FILTER_SCALEOFFSET
    }

    fn name(&self) -> &str {
        "scaleoffset"
    }

    fn options(&self) -> Option<Vec<i64>> {
        Some(vec![i64::from(self.factor())])
    }

    fn metadata(&self) -> FilterMetadata {
        let configuration =
            ScaleOffsetFilterConfiguration::V1(ScaleOffsetFilterConfigurationV1 { mode: self.mode });
        FilterMetadata::new(FILTER_SCALEOFFSET, self.name(), Some(&configuration))
    }

    fn encode(
        &self,
        decoded: Vec<u8>,
        _element_size: usize,
        _options: &CodecOptions,
    ) -> Result<Vec<u8>, FilterError> {
        if decoded.len() % self.width() != 0 {
            return Err(FilterError::InvalidEncoding(format!(
                "{} bytes is not a multiple of the element size {}",
                decoded.len(),
                self.width()
            )));
        }
        let (kind, values, min_bits) = match self.mode {
            ScaleOffsetMode::Integer { min_bits } => {
                (KIND_INTEGER, self.read_integers(&decoded), min_bits)
            }
            ScaleOffsetMode::Float { decimal_scale } => {
                (KIND_FLOAT, self.read_floats(&decoded, decimal_scale)?, 0)
            }
        };
        let min = values.iter().copied().min().unwrap_or(0);
        let max = values.iter().copied().max().unwrap_or(0);
        let nbits = if min_bits == 0 {
            bits_needed((max - min) as u128)
        } else {
            min_bits
        };
        let mask = mask(nbits);

        let mut encoded = Vec::with_capacity(HEADER_SIZE + values.len() * nbits as usize / 8 + 1);
        encoded.push(kind);
        encoded.push(nbits as u8);
        encoded.extend_from_slice(&(min as u64).to_le_bytes());
        encoded.extend_from_slice(&(values.len() as u64).to_le_bytes());
        let mut writer = BitWriter {
            bytes: encoded,
            bit: 0,
        };
        writer.bit = writer.bytes.len() * 8;
        for value in values {
            writer.push((value - min) as u64 & mask, nbits);
        }
        Ok(writer.bytes)
    }

    fn decode(
        &self,
        encoded: Vec<u8>,
        _element_size: usize,
        _options: &CodecOptions,
    ) -> Result<Vec<u8>, FilterError> {
        if encoded.len() < HEADER_SIZE {
            return Err(FilterError::InvalidEncoding(
                "scaleoffset header is truncated".to_string(),
            ));
        }
        let kind = encoded[0];
        let nbits = u32::from(encoded[1]);
        let expected_kind = match self.mode {
            ScaleOffsetMode::Integer { .. } => KIND_INTEGER,
            ScaleOffsetMode::Float { .. } => KIND_FLOAT,
        };
        if kind != expected_kind || nbits > 64 {
            return Err(FilterError::InvalidEncoding(
                "scaleoffset header does not match the data type".to_string(),
            ));
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&encoded[2..10]);
        let min_bits = u64::from_le_bytes(buf);
        buf.copy_from_slice(&encoded[10..18]);
        let count = usize::try_from(u64::from_le_bytes(buf))
            .map_err(|_| FilterError::InvalidEncoding("scaleoffset count overflow".to_string()))?;
        let packed = &encoded[HEADER_SIZE..];
        if count.saturating_mul(nbits as usize) > packed.len() * 8 {
            return Err(FilterError::InvalidEncoding(
                "scaleoffset payload is truncated".to_string(),
            ));
        }

        let signed_min = matches!(
            (self.mode, &self.data_type),
            (ScaleOffsetMode::Float { .. }, _) | (_, DataType::Integer { signed: true, .. })
        );
        let min = if signed_min {
            i128::from(min_bits as i64)
        } else {
            i128::from(min_bits)
        };
        let mut decoded = Vec::with_capacity(count * self.width());
        for i in 0..count {
            let delta = read_bits(packed, i * nbits as usize, nbits);
            self.write_element(min + i128::from(delta), &mut decoded);
        }
        Ok(decoded)
    }
}
