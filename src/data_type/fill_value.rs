//! The fill value of a dataset.
//!
//! The fill value is synthesized for elements of chunks that have never been written.

use derive_more::From;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ErrorKind;

use super::{decode_value, encode_value, CoercionError, DataType, Value};

/// The element bytes of a fill value.
///
/// For variable-length data types these are the element content (e.g. the bytes of a string).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, From)]
pub struct FillValue(Vec<u8>);

/// An invalid fill value.
#[derive(Clone, Debug, Error)]
#[error("invalid fill value for {data_type}: {source}")]
pub struct FillValueError {
    data_type: String,
    source: CoercionError,
}

impl FillValueError {
    /// Returns the [`ErrorKind`] of the error, always [`ErrorKind::Value`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Value
    }
}

impl FillValue {
    /// Create a new fill value from element bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The zero fill value of `data_type`: zero bytes, or an empty variable-length element.
    #[must_use]
    pub fn zero(data_type: &DataType) -> Self {
        Self(vec![0; data_type.fixed_size().unwrap_or(0)])
    }

    /// Create a fill value by encoding `value` as `data_type`.
    ///
    /// # Errors
    /// Returns a [`FillValueError`] if `value` cannot be encoded as `data_type`.
    pub fn from_value(value: &Value, data_type: &DataType) -> Result<Self, FillValueError> {
        let mut bytes = Vec::new();
        encode_value(value, data_type, &mut bytes).map_err(|source| FillValueError {
            data_type: data_type.to_string(),
            source,
        })?;
        Ok(Self(bytes))
    }

    /// Returns the element bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Decode the fill value as `data_type`.
    ///
    /// # Errors
    /// Returns a [`CoercionError`] if the bytes are inconsistent with `data_type`.
    pub fn to_value(&self, data_type: &DataType) -> Result<Value, CoercionError> {
        decode_value(&self.0, data_type)
    }

    /// Returns true if the fill value is compatible with `data_type`.
    #[must_use]
    pub fn is_compatible(&self, data_type: &DataType) -> bool {
        data_type
            .fixed_size()
            .map_or(true, |size| size == self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use crate::data_type::{Charset, CompoundField};

    use super::*;

    #[test]
    fn fill_value_zero() {
        assert_eq!(FillValue::zero(&DataType::int32()).as_bytes(), &[0, 0, 0, 0]);
        assert_eq!(
            FillValue::zero(&DataType::int32())
                .to_value(&DataType::int32())
                .unwrap(),
            Value::Int(0)
        );
        let vlen = DataType::vlen_string(Charset::Utf8);
        assert_eq!(FillValue::zero(&vlen).size(), 0);
        assert_eq!(
            FillValue::zero(&vlen).to_value(&vlen).unwrap(),
            Value::Bytes(vec![])
        );
    }

    #[test]
    fn fill_value_compound() {
        let data_type = DataType::new_compound(vec![
            CompoundField::new("a", DataType::float32()),
            CompoundField::new("b", DataType::int16()),
        ])
        .unwrap();
        let value = Value::compound([("a", Value::Float(1.5)), ("b", Value::Int(-2))]);
        let fill_value = FillValue::from_value(&value, &data_type).unwrap();
        assert!(fill_value.is_compatible(&data_type));
        assert_eq!(fill_value.to_value(&data_type).unwrap(), value);

        let err = FillValue::from_value(&Value::Int(42), &data_type).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
    }

    #[test]
    fn fill_value_out_of_range() {
        let err = FillValue::from_value(&Value::Int(300), &DataType::uint8()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
    }
}
