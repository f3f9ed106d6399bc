use num::ToPrimitive;
use thiserror::Error;

use crate::ErrorKind;

use super::{Charset, DataType, DataTypeError, Value};

/// A value coercion error.
#[derive(Clone, Debug, Error)]
pub enum CoercionError {
    /// A value that cannot be converted to a data type.
    #[error("cannot convert a {value} value to {data_type}")]
    Incompatible {
        /// The value variant.
        value: &'static str,
        /// The target data type.
        data_type: String,
    },
    /// A numeric value out of the range of a data type.
    #[error("value {value} is out of range for {data_type}")]
    OutOfRange {
        /// The value.
        value: String,
        /// The target data type.
        data_type: String,
    },
    /// Non-ASCII text assigned to an ASCII string.
    #[error("cannot encode non-ASCII text {0:?} as ASCII")]
    NonAscii(String),
    /// A string longer than a fixed-length string data type.
    #[error("string of {length} bytes exceeds the fixed length {max_length}")]
    StringTooLong {
        /// The encoded length of the string.
        length: usize,
        /// The fixed length of the data type.
        max_length: usize,
    },
    /// A compound value missing a field.
    #[error("compound value is missing field {0}")]
    MissingField(String),
    /// A compound value with a field not in the data type.
    #[error("compound value has unexpected field {0}")]
    UnexpectedField(String),
    /// Fixed-width text, which has no native representation.
    #[error("fixed-width text has no native fixed-length UTF-8 representation, use a variable-length string")]
    FixedUnicode,
    /// Element bytes which are inconsistent with the data type.
    #[error("invalid element bytes for {0}")]
    InvalidBytes(String),
    /// Text decoding failed.
    #[error("cannot decode bytes as {codec}: {reason}")]
    Decode {
        /// The text codec.
        codec: &'static str,
        /// The reason.
        reason: String,
    },
    /// An invalid data type.
    #[error(transparent)]
    DataType(#[from] DataTypeError),
}

impl CoercionError {
    /// Returns the [`ErrorKind`] of the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Incompatible { .. }
            | Self::MissingField(_)
            | Self::UnexpectedField(_)
            | Self::FixedUnicode => ErrorKind::Type,
            Self::OutOfRange { .. } => ErrorKind::Range,
            Self::NonAscii(_) | Self::Decode { .. } => ErrorKind::Encoding,
            Self::StringTooLong { .. } | Self::InvalidBytes(_) => ErrorKind::Value,
            Self::DataType(err) => err.kind(),
        }
    }
}

fn incompatible(value: &Value, data_type: &DataType) -> CoercionError {
    CoercionError::Incompatible {
        value: value.variant_name(),
        data_type: data_type.to_string(),
    }
}

fn out_of_range(value: impl ToString, data_type: &DataType) -> CoercionError {
    CoercionError::OutOfRange {
        value: value.to_string(),
        data_type: data_type.to_string(),
    }
}

/// Encode `value` as `data_type` element bytes, appending them to `out`.
///
/// Fixed-size data types append exactly [`DataType::fixed_size`] little-endian bytes.
/// Variable-length data types append the element content: the string bytes, or the packed base type elements of a sequence.
///
/// Numeric coercion is strict: integers must fit the target integer type, floats written to integers are truncated toward zero and must be finite and in range, and finite values must not overflow a target float.
///
/// # Errors
/// Returns a [`CoercionError`] if `value` cannot be represented by `data_type`.
pub fn encode_value(
    value: &Value,
    data_type: &DataType,
    out: &mut Vec<u8>,
) -> Result<(), CoercionError> {
    match data_type {
        DataType::Integer { width, signed } => encode_integer(value, data_type, *width, *signed, out),
        DataType::Enum { base, .. } => encode_value(value, base, out),
        DataType::Float { width } => encode_float(value, data_type, *width, out),
        DataType::FixedString { length, charset } => {
            let bytes = string_bytes(value, data_type, *charset)?;
            if bytes.len() > *length {
                return Err(CoercionError::StringTooLong {
                    length: bytes.len(),
                    max_length: *length,
                });
            }
            out.extend_from_slice(bytes);
            out.resize(out.len() + length - bytes.len(), 0);
            Ok(())
        }
        DataType::VarString { charset } => {
            out.extend_from_slice(string_bytes(value, data_type, *charset)?);
            Ok(())
        }
        DataType::Compound { fields } => {
            let Value::Compound(field_values) = value else {
                return Err(incompatible(value, data_type));
            };
            if let Some((name, _)) = field_values
                .iter()
                .find(|(name, _)| !fields.iter().any(|field| &field.name == name))
            {
                return Err(CoercionError::UnexpectedField(name.clone()));
            }
            for field in fields {
                let (_, field_value) = field_values
                    .iter()
                    .find(|(name, _)| name == &field.name)
                    .ok_or_else(|| CoercionError::MissingField(field.name.clone()))?;
                encode_value(field_value, &field.data_type, out)?;
            }
            Ok(())
        }
        DataType::VarLength { base } => {
            let Value::Sequence(items) = value else {
                return Err(incompatible(value, data_type));
            };
            for item in items {
                encode_value(item, base, out)?;
            }
            Ok(())
        }
    }
}

fn string_bytes<'a>(
    value: &'a Value,
    data_type: &DataType,
    charset: Charset,
) -> Result<&'a [u8], CoercionError> {
    match value {
        Value::Bytes(bytes) => Ok(bytes),
        Value::Text(text) => {
            if charset == Charset::Ascii && !text.is_ascii() {
                Err(CoercionError::NonAscii(text.clone()))
            } else {
                Ok(text.as_bytes())
            }
        }
        _ => Err(incompatible(value, data_type)),
    }
}

fn encode_integer(
    value: &Value,
    data_type: &DataType,
    width: usize,
    signed: bool,
    out: &mut Vec<u8>,
) -> Result<(), CoercionError> {
    let integer: i128 = match value {
        Value::Bool(value) => i128::from(*value),
        Value::Int(value) => i128::from(*value),
        Value::UInt(value) => i128::from(*value),
        Value::Float(value) => value
            .trunc()
            .to_i128()
            .ok_or_else(|| out_of_range(value, data_type))?,
        _ => return Err(incompatible(value, data_type)),
    };
    let bits = u32::try_from(width * 8).unwrap_or(64);
    let (min, max) = if signed {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    } else {
        (0, (1i128 << bits) - 1)
    };
    if integer < min || integer > max {
        return Err(out_of_range(integer, data_type));
    }
    out.extend_from_slice(&integer.to_le_bytes()[..width]);
    Ok(())
}

fn encode_float(
    value: &Value,
    data_type: &DataType,
    width: usize,
    out: &mut Vec<u8>,
) -> Result<(), CoercionError> {
    let float: f64 = match value {
        Value::Bool(value) => f64::from(u8::from(*value)),
        Value::Int(value) => value.to_f64().ok_or_else(|| out_of_range(value, data_type))?,
        Value::UInt(value) => value.to_f64().ok_or_else(|| out_of_range(value, data_type))?,
        Value::Float(value) => *value,
        _ => return Err(incompatible(value, data_type)),
    };
    match width {
        2 => {
            let narrowed = half::f16::from_f64(float);
            if float.is_finite() && !narrowed.is_finite() {
                return Err(out_of_range(float, data_type));
            }
            out.extend_from_slice(&narrowed.to_le_bytes());
        }
        4 => {
            #[allow(clippy::cast_possible_truncation)]
            let narrowed = float as f32;
            if float.is_finite() && !narrowed.is_finite() {
                return Err(out_of_range(float, data_type));
            }
            out.extend_from_slice(&narrowed.to_le_bytes());
        }
        _ => out.extend_from_slice(&float.to_le_bytes()),
    }
    Ok(())
}

/// Decode element `bytes` of `data_type` into a [`Value`].
///
/// `bytes` are the fixed-size element bytes, or the content of a variable-length element.
/// Strings decode to [`Value::Bytes`] with trailing nulls of fixed-length strings removed; use a string view to decode text.
///
/// # Errors
/// Returns [`CoercionError::InvalidBytes`] if `bytes` are inconsistent with `data_type`.
pub fn decode_value(bytes: &[u8], data_type: &DataType) -> Result<Value, CoercionError> {
    if let Some(size) = data_type.fixed_size() {
        if bytes.len() != size {
            return Err(CoercionError::InvalidBytes(data_type.to_string()));
        }
    }
    match data_type {
        DataType::Integer { width, signed } => {
            let negative = *signed && bytes[width - 1] & 0x80 != 0;
            let mut buf = if negative { [0xff; 8] } else { [0; 8] };
            buf[..*width].copy_from_slice(bytes);
            Ok(if *signed {
                Value::Int(i64::from_le_bytes(buf))
            } else {
                Value::UInt(u64::from_le_bytes(buf))
            })
        }
        DataType::Enum { base, .. } => decode_value(bytes, base),
        DataType::Float { width } => Ok(Value::Float(match *width {
            2 => half::f16::from_le_bytes([bytes[0], bytes[1]]).to_f64(),
            4 => f64::from(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
            _ => f64::from_le_bytes(
                bytes
                    .try_into()
                    .map_err(|_| CoercionError::InvalidBytes(data_type.to_string()))?,
            ),
        })),
        DataType::FixedString { .. } => {
            let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
            Ok(Value::Bytes(bytes[..end].to_vec()))
        }
        DataType::VarString { .. } => Ok(Value::Bytes(bytes.to_vec())),
        DataType::Compound { fields } => {
            let mut offset = 0;
            let mut values = Vec::with_capacity(fields.len());
            for field in fields {
                let size = field.data_type.stored_size();
                values.push((
                    field.name.clone(),
                    decode_value(&bytes[offset..offset + size], &field.data_type)?,
                ));
                offset += size;
            }
            Ok(Value::Compound(values))
        }
        DataType::VarLength { base } => {
            let size = base.stored_size();
            if bytes.len() % size != 0 {
                return Err(CoercionError::InvalidBytes(data_type.to_string()));
            }
            Ok(Value::Sequence(
                bytes
                    .chunks_exact(size)
                    .map(|item| decode_value(item, base))
                    .collect::<Result<_, _>>()?,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::data_type::CompoundField;

    use super::*;

    fn encode(value: impl Into<Value>, data_type: &DataType) -> Result<Vec<u8>, CoercionError> {
        let mut out = Vec::new();
        encode_value(&value.into(), data_type, &mut out)?;
        Ok(out)
    }

    fn round_trip(value: impl Into<Value>, data_type: &DataType) -> Value {
        decode_value(&encode(value, data_type).unwrap(), data_type).unwrap()
    }

    #[test]
    fn coercion_integers() {
        assert_eq!(encode(-2i64, &DataType::int16()).unwrap(), vec![0xfe, 0xff]);
        assert_eq!(encode(258u16, &DataType::uint32()).unwrap(), vec![2, 1, 0, 0]);
        assert_eq!(round_trip(-5i8, &DataType::int64()), Value::Int(-5));
        assert_eq!(round_trip(i64::MIN, &DataType::int64()), Value::Int(i64::MIN));
        assert_eq!(round_trip(u64::MAX, &DataType::uint64()), Value::UInt(u64::MAX));
        assert_eq!(round_trip(1.9, &DataType::int32()), Value::Int(1));
        assert_eq!(round_trip(-1.9, &DataType::int32()), Value::Int(-1));
        assert_eq!(round_trip(true, &DataType::uint8()), Value::UInt(1));
    }

    #[test]
    fn coercion_integers_out_of_range() {
        for (value, data_type) in [
            (Value::Int(128), DataType::int8()),
            (Value::Int(-129), DataType::int8()),
            (Value::Int(-1), DataType::uint64()),
            (Value::UInt(u64::MAX), DataType::int64()),
            (Value::Int(65536), DataType::uint16()),
            (Value::Float(f64::NAN), DataType::int32()),
            (Value::Float(f64::INFINITY), DataType::int32()),
            (Value::Float(1e20), DataType::int64()),
        ] {
            let err = encode(value, &data_type).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Range);
        }
    }

    #[test]
    fn coercion_floats() {
        assert_eq!(round_trip(0.5f32, &DataType::float16()), Value::Float(0.5));
        assert_eq!(round_trip(3i32, &DataType::float32()), Value::Float(3.0));
        assert_eq!(round_trip(0.1f64, &DataType::float64()), Value::Float(0.1));
        assert_eq!(
            round_trip(f64::INFINITY, &DataType::float32()),
            Value::Float(f64::INFINITY)
        );
        assert_eq!(
            encode(1e300, &DataType::float32()).unwrap_err().kind(),
            ErrorKind::Range
        );
        assert_eq!(
            encode(1e6, &DataType::float16()).unwrap_err().kind(),
            ErrorKind::Range
        );
        assert_eq!(
            encode("1.0", &DataType::float64()).unwrap_err().kind(),
            ErrorKind::Type
        );
    }

    #[test]
    fn coercion_fixed_strings() {
        let data_type = DataType::fixed_string(10, Charset::Ascii);
        assert_eq!(
            round_trip("0123456789", &data_type),
            Value::bytes(*b"0123456789")
        );
        assert_eq!(
            encode("01234567890", &data_type).unwrap_err().kind(),
            ErrorKind::Value
        );
        assert_eq!(encode("ab", &data_type).unwrap(), b"ab\0\0\0\0\0\0\0\0");
        assert_eq!(round_trip("ab", &data_type), Value::bytes(*b"ab"));
        // bytes are stored verbatim
        assert_eq!(
            round_trip(Value::bytes(*b"Hello\xef"), &data_type),
            Value::bytes(*b"Hello\xef")
        );
        assert_eq!(
            encode("cù", &data_type).unwrap_err().kind(),
            ErrorKind::Encoding
        );
        let data_type = DataType::fixed_string(5, Charset::Utf8);
        assert_eq!(round_trip("cù", &data_type), Value::bytes("cù".as_bytes()));
        assert!(encode(1, &data_type).is_err());
    }

    #[test]
    fn coercion_vlen_strings() {
        let ascii = DataType::vlen_string(Charset::Ascii);
        let utf8 = DataType::vlen_string(Charset::Utf8);
        assert_eq!(round_trip("hello", &ascii), Value::bytes(*b"hello"));
        assert_eq!(
            encode("fàilte", &ascii).unwrap_err().kind(),
            ErrorKind::Encoding
        );
        assert_eq!(round_trip("fàilte", &utf8), Value::bytes("fàilte".as_bytes()));
        assert_eq!(
            round_trip(Value::bytes("fàilte".as_bytes()), &ascii),
            Value::bytes("fàilte".as_bytes())
        );
        assert_eq!(round_trip("", &utf8), Value::bytes(Vec::new()));
    }

    #[test]
    fn coercion_compound() {
        let data_type = DataType::new_compound(vec![
            CompoundField::new("a", DataType::int32()),
            CompoundField::new("b", DataType::float64()),
            CompoundField::new("c", DataType::fixed_string(3, Charset::Ascii)),
        ])
        .unwrap();
        // fields are matched by name and encoded in declaration order
        let value = Value::compound([
            ("c", Value::from("xyz")),
            ("a", Value::from(-3)),
            ("b", Value::from(2.5)),
        ]);
        let bytes = encode(value, &data_type).unwrap();
        assert_eq!(bytes.len(), 15);
        assert_eq!(&bytes[..4], &(-3i32).to_le_bytes());
        assert_eq!(
            decode_value(&bytes, &data_type).unwrap(),
            Value::compound([
                ("a", Value::Int(-3)),
                ("b", Value::Float(2.5)),
                ("c", Value::bytes(*b"xyz")),
            ])
        );

        let missing = Value::compound([("a", 1), ("b", 2)]);
        assert_eq!(encode(missing, &data_type).unwrap_err().kind(), ErrorKind::Type);
        let extra = Value::compound([
            ("a", Value::from(1)),
            ("b", Value::from(2)),
            ("c", Value::from("x")),
            ("d", Value::from(4)),
        ]);
        assert_eq!(encode(extra, &data_type).unwrap_err().kind(), ErrorKind::Type);
        let mistyped = Value::compound([
            ("a", Value::from("one")),
            ("b", Value::from(2)),
            ("c", Value::from("x")),
        ]);
        assert_eq!(encode(mistyped, &data_type).unwrap_err().kind(), ErrorKind::Type);
        assert_eq!(encode(42, &data_type).unwrap_err().kind(), ErrorKind::Type);
    }

    #[test]
    fn coercion_enum() {
        let data_type =
            DataType::new_enum(DataType::int16(), [("RED", 0), ("GREEN", 1)]).unwrap();
        // the mapping is not validated on write
        assert_eq!(round_trip(7, &data_type), Value::Int(7));
        assert_eq!(round_trip(true, &DataType::bool()), Value::Int(1));
    }

    #[test]
    fn coercion_vlen_sequences() {
        let data_type = DataType::new_vlen(DataType::int32()).unwrap();
        assert_eq!(
            round_trip(Value::sequence([1.4, 2.9, -3.1]), &data_type),
            Value::sequence([1, 2, -3])
        );
        assert_eq!(round_trip(Value::sequence(Vec::<i32>::new()), &data_type), Value::Sequence(vec![]));
        let data_type = DataType::new_vlen(DataType::float64()).unwrap();
        assert_eq!(
            round_trip(Value::sequence([1, 2]), &data_type),
            Value::sequence([1.0, 2.0])
        );
        assert_eq!(
            encode(Value::Int(1), &data_type).unwrap_err().kind(),
            ErrorKind::Type
        );
        assert!(decode_value(&[0, 0, 0], &data_type).is_err());
    }
}
