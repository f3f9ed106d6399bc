//! Fixed or variable-length array element bytes.

use thiserror::Error;

use crate::{
    data_type::{decode_value, encode_value, CoercionError, DataType, FillValue, Value},
    ErrorKind,
};

/// Fixed or variable-length array bytes.
///
/// Element offsets are present only if the bytes are composed of variable-length elements.
/// The offsets of `n` elements have length `n + 1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArrayBytes {
    /// Bytes of packed fixed-size elements.
    Fixed(Vec<u8>),
    /// Concatenated variable-length element bytes and their offsets.
    Variable(Vec<u8>, Vec<usize>),
}

/// An [`ArrayBytes`] error.
#[derive(Clone, Debug, Error)]
pub enum ArrayBytesError {
    /// The bytes do not hold the expected number of elements.
    #[error("expected {expected} elements, got bytes for {got}")]
    UnexpectedNumberOfElements {
        /// The expected number of elements.
        expected: u64,
        /// The number of elements in the bytes.
        got: u64,
    },
    /// Fixed bytes used with a variable-length data type, or vice versa.
    #[error("array bytes are not consistent with data type {0}")]
    IncompatibleDataType(String),
    /// Variable-length offsets which are not monotonic or exceed the bytes.
    #[error("invalid variable-length element offsets")]
    InvalidOffsets,
}

impl ArrayBytesError {
    /// Returns the [`ErrorKind`] of the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnexpectedNumberOfElements { .. } | Self::InvalidOffsets => ErrorKind::Value,
            Self::IncompatibleDataType(_) => ErrorKind::Type,
        }
    }
}

impl ArrayBytes {
    /// Create array bytes with `num_elements` copies of `fill_value`.
    #[must_use]
    pub fn new_fill_value(data_type: &DataType, num_elements: usize, fill_value: &FillValue) -> Self {
        if data_type.fixed_size().is_some() {
            Self::Fixed(fill_value.as_bytes().repeat(num_elements))
        } else {
            Self::Variable(
                fill_value.as_bytes().repeat(num_elements),
                (0..=num_elements).map(|i| i * fill_value.size()).collect(),
            )
        }
    }

    /// Encode `values` as `data_type`.
    ///
    /// # Errors
    /// Returns a [`CoercionError`] if any value cannot be encoded.
    pub fn from_values(values: &[Value], data_type: &DataType) -> Result<Self, CoercionError> {
        let mut bytes = Vec::new();
        if let Some(size) = data_type.fixed_size() {
            bytes.reserve(values.len() * size);
            for value in values {
                encode_value(value, data_type, &mut bytes)?;
            }
            Ok(Self::Fixed(bytes))
        } else {
            let mut offsets = Vec::with_capacity(values.len() + 1);
            offsets.push(0);
            for value in values {
                encode_value(value, data_type, &mut bytes)?;
                offsets.push(bytes.len());
            }
            Ok(Self::Variable(bytes, offsets))
        }
    }

    /// Decode the elements as `data_type` values.
    ///
    /// # Errors
    /// Returns a [`CoercionError`] if the bytes are inconsistent with `data_type`.
    pub fn to_values(&self, data_type: &DataType) -> Result<Vec<Value>, CoercionError> {
        match (self, data_type.fixed_size()) {
            (Self::Fixed(bytes), Some(size)) if size > 0 => bytes
                .chunks_exact(size)
                .map(|element| decode_value(element, data_type))
                .collect(),
            (Self::Variable(bytes, offsets), None) => offsets
                .windows(2)
                .map(|w| decode_value(&bytes[w[0]..w[1]], data_type))
                .collect(),
            _ => Err(CoercionError::InvalidBytes(data_type.to_string())),
        }
    }

    /// Returns the number of elements, given the data type.
    #[must_use]
    pub fn num_elements(&self, data_type: &DataType) -> u64 {
        match self {
            Self::Fixed(bytes) => data_type
                .fixed_size()
                .filter(|&size| size > 0)
                .map_or(0, |size| (bytes.len() / size) as u64),
            Self::Variable(_, offsets) => offsets.len().saturating_sub(1) as u64,
        }
    }

    /// Returns the size of the element bytes, excluding offsets.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Fixed(bytes) | Self::Variable(bytes, _) => bytes.len(),
        }
    }

    /// Validate the bytes against `data_type` and an expected number of elements.
    ///
    /// # Errors
    /// Returns an [`ArrayBytesError`] if the bytes are inconsistent.
    pub fn validate(&self, data_type: &DataType, num_elements: u64) -> Result<(), ArrayBytesError> {
        match (self, data_type.fixed_size()) {
            (Self::Fixed(bytes), Some(size)) => {
                if bytes.len() as u64 == num_elements * size as u64 {
                    Ok(())
                } else {
                    Err(ArrayBytesError::UnexpectedNumberOfElements {
                        expected: num_elements,
                        got: if size == 0 { 0 } else { (bytes.len() / size) as u64 },
                    })
                }
            }
            (Self::Variable(bytes, offsets), None) => {
                if offsets.len() as u64 != num_elements + 1 {
                    return Err(ArrayBytesError::UnexpectedNumberOfElements {
                        expected: num_elements,
                        got: offsets.len().saturating_sub(1) as u64,
                    });
                }
                if offsets.first() != Some(&0)
                    || offsets.windows(2).any(|w| w[0] > w[1])
                    || offsets.last() != Some(&bytes.len())
                {
                    return Err(ArrayBytesError::InvalidOffsets);
                }
                Ok(())
            }
            _ => Err(ArrayBytesError::IncompatibleDataType(data_type.to_string())),
        }
    }
}

/// A mutable buffer of elements used to gather and scatter chunk elements.
#[derive(Clone, Debug)]
pub(crate) enum ElementBuffer {
    Fixed { bytes: Vec<u8>, element_size: usize },
    Variable(Vec<Vec<u8>>),
}

impl ElementBuffer {
    /// Create a buffer of `num_elements` copies of `fill_value`.
    pub(crate) fn new_fill_value(
        data_type: &DataType,
        num_elements: usize,
        fill_value: &FillValue,
    ) -> Self {
        match data_type.fixed_size() {
            Some(element_size) => Self::Fixed {
                bytes: fill_value.as_bytes().repeat(num_elements),
                element_size,
            },
            None => Self::Variable(vec![fill_value.as_bytes().to_vec(); num_elements]),
        }
    }

    /// Create a buffer from validated array bytes.
    pub(crate) fn from_array_bytes(bytes: ArrayBytes, data_type: &DataType) -> Self {
        match bytes {
            ArrayBytes::Fixed(bytes) => Self::Fixed {
                bytes,
                element_size: data_type.fixed_size().unwrap_or_default(),
            },
            ArrayBytes::Variable(bytes, offsets) => Self::Variable(
                offsets
                    .windows(2)
                    .map(|w| bytes[w[0]..w[1]].to_vec())
                    .collect(),
            ),
        }
    }

    pub(crate) fn into_array_bytes(self) -> ArrayBytes {
        match self {
            Self::Fixed { bytes, .. } => ArrayBytes::Fixed(bytes),
            Self::Variable(elements) => {
                let mut offsets = Vec::with_capacity(elements.len() + 1);
                offsets.push(0);
                let mut bytes = Vec::with_capacity(elements.iter().map(Vec::len).sum());
                for element in elements {
                    bytes.extend_from_slice(&element);
                    offsets.push(bytes.len());
                }
                ArrayBytes::Variable(bytes, offsets)
            }
        }
    }

    pub(crate) fn element(&self, index: usize) -> &[u8] {
        match self {
            Self::Fixed {
                bytes,
                element_size,
            } => &bytes[index * element_size..(index + 1) * element_size],
            Self::Variable(elements) => &elements[index],
        }
    }

    pub(crate) fn set_element(&mut self, index: usize, element: &[u8]) {
        match self {
            Self::Fixed {
                bytes,
                element_size,
            } => bytes[index * *element_size..(index + 1) * *element_size].copy_from_slice(element),
            Self::Variable(elements) => {
                elements[index].clear();
                elements[index].extend_from_slice(element);
            }
        }
    }

    /// Copy a run of `count` consecutive elements starting at `src_index` of `src` to `dst_index`.
    pub(crate) fn copy_run(&mut self, dst_index: usize, src: &Self, src_index: usize, count: usize) {
        match (self, src) {
            (
                Self::Fixed {
                    bytes,
                    element_size,
                },
                Self::Fixed {
                    bytes: src_bytes,
                    element_size: src_element_size,
                },
            ) if element_size == src_element_size => {
                let size = *element_size;
                bytes[dst_index * size..(dst_index + count) * size]
                    .copy_from_slice(&src_bytes[src_index * size..(src_index + count) * size]);
            }
            (dst, src) => {
                for i in 0..count {
                    dst.set_element(dst_index + i, src.element(src_index + i));
                }
            }
        }
    }
}
