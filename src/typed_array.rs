//! Typed N-dimensional arrays returned by reads.

mod element;

pub use element::{Element, ElementError};

use thiserror::Error;

use crate::{
    array_bytes::{ArrayBytes, ArrayBytesError},
    data_type::{ArrayValue, CoercionError, DataType, Value},
    num_elements, ravel_indices, ArrayShape, ErrorKind,
};

/// An N-dimensional array of elements of a [`DataType`] in row-major order.
///
/// Reads return typed arrays carrying the data type and logical shape of the selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypedArray {
    data_type: DataType,
    shape: ArrayShape,
    bytes: ArrayBytes,
}

/// A [`TypedArray`] error.
#[derive(Clone, Debug, Error)]
pub enum TypedArrayError {
    /// Inconsistent bytes.
    #[error(transparent)]
    ArrayBytes(#[from] ArrayBytesError),
    /// A value coercion error.
    #[error(transparent)]
    Coercion(#[from] CoercionError),
    /// An element access with invalid indices.
    #[error("indices {indices:?} are out of bounds of shape {shape:?}")]
    IndexOutOfBounds {
        /// The indices.
        indices: Vec<u64>,
        /// The array shape.
        shape: ArrayShape,
    },
}

impl TypedArrayError {
    /// Returns the [`ErrorKind`] of the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ArrayBytes(err) => err.kind(),
            Self::Coercion(err) => err.kind(),
            Self::IndexOutOfBounds { .. } => ErrorKind::Value,
        }
    }
}

impl TypedArray {
    /// Create a new typed array.
    ///
    /// # Errors
    /// Returns [`TypedArrayError::ArrayBytes`] if `bytes` are inconsistent with `data_type` and `shape`.
    pub fn new(
        data_type: DataType,
        shape: ArrayShape,
        bytes: ArrayBytes,
    ) -> Result<Self, TypedArrayError> {
        bytes.validate(&data_type, num_elements(&shape))?;
        Ok(Self {
            data_type,
            shape,
            bytes,
        })
    }

    pub(crate) fn new_unchecked(data_type: DataType, shape: ArrayShape, bytes: ArrayBytes) -> Self {
        debug_assert!(bytes.validate(&data_type, num_elements(&shape)).is_ok());
        Self {
            data_type,
            shape,
            bytes,
        }
    }

    /// Create a typed array by encoding `values` as `data_type`.
    ///
    /// # Errors
    /// Returns a [`TypedArrayError`] if a value cannot be encoded, or the number of values does not match `shape`.
    pub fn from_values(
        data_type: DataType,
        shape: ArrayShape,
        values: &[Value],
    ) -> Result<Self, TypedArrayError> {
        let bytes = ArrayBytes::from_values(values, &data_type)?;
        Self::new(data_type, shape, bytes)
    }

    /// Returns the data type.
    #[must_use]
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Returns the shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Returns the element bytes.
    #[must_use]
    pub fn bytes(&self) -> &ArrayBytes {
        &self.bytes
    }

    /// Consume the array and return the element bytes.
    #[must_use]
    pub fn into_bytes(self) -> ArrayBytes {
        self.bytes
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        num_elements(&self.shape)
    }

    /// Returns true if the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_elements() == 0
    }

    /// Decode the elements into [`Value`]s in row-major order.
    ///
    /// # Errors
    /// Returns a [`CoercionError`] if the element bytes are invalid.
    pub fn to_values(&self) -> Result<Vec<Value>, CoercionError> {
        self.bytes.to_values(&self.data_type)
    }

    /// Decode the element at `indices`.
    ///
    /// # Errors
    /// Returns a [`TypedArrayError`] if `indices` are out of bounds or the element bytes are invalid.
    pub fn value(&self, indices: &[u64]) -> Result<Value, TypedArrayError> {
        if indices.len() != self.shape.len()
            || std::iter::zip(indices, &self.shape).any(|(i, s)| i >= s)
        {
            return Err(TypedArrayError::IndexOutOfBounds {
                indices: indices.to_vec(),
                shape: self.shape.clone(),
            });
        }
        let index = usize::try_from(ravel_indices(indices, &self.shape)).unwrap_or(usize::MAX);
        let value = match &self.bytes {
            ArrayBytes::Fixed(bytes) => {
                let size = self.data_type.fixed_size().unwrap_or_default();
                crate::data_type::decode_value(
                    &bytes[index * size..(index + 1) * size],
                    &self.data_type,
                )?
            }
            ArrayBytes::Variable(bytes, offsets) => crate::data_type::decode_value(
                &bytes[offsets[index]..offsets[index + 1]],
                &self.data_type,
            )?,
        };
        Ok(value)
    }

    /// Returns the elements as a vector of `T` in row-major order.
    ///
    /// # Errors
    /// Returns an [`ElementError`] if `T` is incompatible with the data type.
    pub fn elements<T: Element>(&self) -> Result<Vec<T>, ElementError> {
        T::validate_data_type(&self.data_type)?;
        match &self.bytes {
            ArrayBytes::Fixed(bytes) => Ok(T::from_le_bytes_vec(bytes)),
            ArrayBytes::Variable(..) => Err(ElementError::IncompatibleDataType(
                self.data_type.to_string(),
            )),
        }
    }

    /// Convert the array to another data type, with the same coercion rules as a write.
    ///
    /// # Errors
    /// Returns a [`CoercionError`] if an element cannot be represented by `data_type`.
    pub fn astype(&self, data_type: &DataType) -> Result<Self, CoercionError> {
        let bytes = ArrayBytes::from_values(&self.to_values()?, data_type)?;
        Ok(Self::new_unchecked(
            data_type.clone(),
            self.shape.clone(),
            bytes,
        ))
    }

    /// Convert the array to an [`ArrayValue`] declaring this data type.
    ///
    /// # Errors
    /// Returns a [`CoercionError`] if the element bytes are invalid.
    pub fn to_array_value(&self) -> Result<ArrayValue, CoercionError> {
        let array_value = ArrayValue::new(self.shape.clone(), self.to_values()?)
            .map_err(|_| CoercionError::InvalidBytes(self.data_type.to_string()))?;
        Ok(array_value.with_data_type(self.data_type.clone()))
    }
}

impl TryFrom<&TypedArray> for ArrayValue {
    type Error = CoercionError;

    fn try_from(array: &TypedArray) -> Result<Self, Self::Error> {
        array.to_array_value()
    }
}
