use thiserror::Error;

use crate::{num_elements, ArrayShape, ErrorKind};

use super::{Charset, CoercionError, CompoundField, DataType};

/// A caller-supplied element value.
///
/// Every value is converted to the canonical element bytes of a [`DataType`] by one encode path per variant.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// An unsigned integer.
    UInt(u64),
    /// A floating point number.
    Float(f64),
    /// A byte string.
    Bytes(Vec<u8>),
    /// A text string.
    Text(String),
    /// A record of named field values.
    Compound(Vec<(String, Value)>),
    /// A one dimensional sequence of values.
    Sequence(Vec<Value>),
}

impl Value {
    /// Create a compound value from `(name, value)` pairs.
    pub fn compound(
        fields: impl IntoIterator<Item = (impl Into<String>, impl Into<Value>)>,
    ) -> Self {
        Self::Compound(
            fields
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }

    /// Create a sequence value.
    pub fn sequence(values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Self::Sequence(values.into_iter().map(Into::into).collect())
    }

    /// Create a byte string value.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(bytes.into())
    }

    /// Returns the name of the variant, used in error messages.
    #[must_use]
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::Bytes(_) => "bytes",
            Self::Text(_) => "str",
            Self::Compound(_) => "compound",
            Self::Sequence(_) => "sequence",
        }
    }
}

macro_rules! impl_value_from {
    ($variant:ident, $target:ty, [$($t:ty),*]) => {
        $(
            impl From<$t> for Value {
                fn from(value: $t) -> Self {
                    Self::$variant(<$target>::from(value))
                }
            }
        )*
    };
}

impl_value_from!(Int, i64, [i8, i16, i32, i64]);
impl_value_from!(UInt, u64, [u8, u16, u32, u64]);
impl_value_from!(Float, f64, [f32, f64]);
impl_value_from!(Bool, bool, [bool]);
impl_value_from!(Text, String, [String, &str]);

impl From<half::f16> for Value {
    fn from(value: half::f16) -> Self {
        Self::Float(value.to_f64())
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// The declared element type of an [`ArrayValue`].
#[derive(Clone, Debug, PartialEq)]
pub enum SourceType {
    /// The values are of this data type.
    Declared(DataType),
    /// Fixed-width text of this many characters.
    ///
    /// There is no native fixed-length UTF-8 representation, so such sources are rejected.
    FixedUnicode(usize),
}

/// An [`ArrayValue`] error.
#[derive(Clone, Debug, Error)]
pub enum ArrayValueError {
    /// The number of values does not match the shape.
    #[error("{num_values} values cannot be arranged in shape {shape:?}")]
    ShapeMismatch {
        /// The number of values.
        num_values: usize,
        /// The requested shape.
        shape: ArrayShape,
    },
}

impl ArrayValueError {
    /// Returns the [`ErrorKind`] of the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Value
    }
}

/// A caller-supplied N-dimensional array of [`Value`]s in row-major order.
///
/// A zero dimensional array value is a scalar, and broadcasts over any selection on write.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayValue {
    shape: ArrayShape,
    values: Vec<Value>,
    source_type: Option<SourceType>,
}

impl ArrayValue {
    /// Create a new array value.
    ///
    /// # Errors
    /// Returns [`ArrayValueError::ShapeMismatch`] if the number of `values` does not match `shape`.
    pub fn new(shape: ArrayShape, values: Vec<Value>) -> Result<Self, ArrayValueError> {
        if num_elements(&shape) == values.len() as u64 {
            Ok(Self {
                shape,
                values,
                source_type: None,
            })
        } else {
            Err(ArrayValueError::ShapeMismatch {
                num_values: values.len(),
                shape,
            })
        }
    }

    /// Create a scalar (zero dimensional) array value.
    pub fn scalar(value: impl Into<Value>) -> Self {
        Self {
            shape: vec![],
            values: vec![value.into()],
            source_type: None,
        }
    }

    /// Create a one dimensional array of fixed-width byte strings.
    ///
    /// The inferred data type is a fixed-length ASCII string of `width` bytes.
    pub fn fixed_bytes(width: usize, values: impl IntoIterator<Item = impl Into<Vec<u8>>>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Value::bytes).collect();
        Self {
            shape: vec![values.len() as u64],
            values,
            source_type: Some(SourceType::Declared(DataType::fixed_string(
                width,
                Charset::Ascii,
            ))),
        }
    }

    /// Create a one dimensional array of fixed-width text strings.
    ///
    /// Creating or writing a dataset from such an array fails, as there is no fixed-length UTF-8 representation.
    pub fn fixed_unicode(width: usize, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let values: Vec<Value> = values.into_iter().map(|v| Value::Text(v.into())).collect();
        Self {
            shape: vec![values.len() as u64],
            values,
            source_type: Some(SourceType::FixedUnicode(width)),
        }
    }

    /// Declare the data type of the values.
    #[must_use]
    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.source_type = Some(SourceType::Declared(data_type));
        self
    }

    /// Reshape the array value.
    ///
    /// # Errors
    /// Returns [`ArrayValueError::ShapeMismatch`] if the number of elements in `shape` does not match the number of values.
    pub fn reshape(self, shape: ArrayShape) -> Result<Self, ArrayValueError> {
        if num_elements(&shape) == self.values.len() as u64 {
            Ok(Self { shape, ..self })
        } else {
            Err(ArrayValueError::ShapeMismatch {
                num_values: self.values.len(),
                shape,
            })
        }
    }

    /// Returns the shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Returns the values in row-major order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consume the array value and return the values.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Returns the declared source type, if any.
    #[must_use]
    pub fn source_type(&self) -> Option<&SourceType> {
        self.source_type.as_ref()
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn num_elements(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the array value is zero dimensional.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    /// Infer the data type of the values.
    ///
    /// - byte strings infer a variable-length ASCII string,
    /// - text strings infer a variable-length UTF-8 string,
    /// - integers infer a 64-bit integer (unsigned if all values are unsigned), floats a double, and booleans [`DataType::bool`],
    /// - sequences infer a variable-length sequence of their inferred element type,
    /// - compounds infer a compound of their inferred field types.
    ///
    /// A declared data type is returned as is.
    ///
    /// # Errors
    /// Returns a [`CoercionError`] if the source is fixed-width text, or the values are heterogeneous.
    pub fn infer_data_type(&self) -> Result<DataType, CoercionError> {
        match &self.source_type {
            Some(SourceType::Declared(data_type)) => Ok(data_type.clone()),
            Some(SourceType::FixedUnicode(_)) => Err(CoercionError::FixedUnicode),
            None => infer_data_type(&self.values),
        }
    }
}

fn infer_data_type(values: &[Value]) -> Result<DataType, CoercionError> {
    let Some(first) = values.first() else {
        return Ok(DataType::float64());
    };
    let mismatch = |value: &Value| CoercionError::Incompatible {
        value: value.variant_name(),
        data_type: first.variant_name().to_string(),
    };
    match first {
        Value::Bool(_) => {
            if let Some(value) = values.iter().find(|v| !matches!(v, Value::Bool(_))) {
                return Err(mismatch(value));
            }
            Ok(DataType::bool())
        }
        Value::Int(_) | Value::UInt(_) | Value::Float(_) => {
            let mut any_float = false;
            let mut any_signed = false;
            for value in values {
                match value {
                    Value::Float(_) => any_float = true,
                    Value::Int(_) => any_signed = true,
                    Value::UInt(_) => {}
                    value => return Err(mismatch(value)),
                }
            }
            Ok(if any_float {
                DataType::float64()
            } else if any_signed {
                DataType::int64()
            } else {
                DataType::uint64()
            })
        }
        Value::Bytes(_) | Value::Text(_) => {
            let charset = if matches!(first, Value::Bytes(_)) {
                Charset::Ascii
            } else {
                Charset::Utf8
            };
            if let Some(value) = values
                .iter()
                .find(|v| std::mem::discriminant(*v) != std::mem::discriminant(first))
            {
                return Err(mismatch(value));
            }
            Ok(DataType::vlen_string(charset))
        }
        Value::Sequence(_) => {
            let mut items = Vec::new();
            for value in values {
                if let Value::Sequence(sequence) = value {
                    items.extend(sequence.iter().cloned());
                } else {
                    return Err(mismatch(value));
                }
            }
            let base = if items.is_empty() {
                DataType::float64()
            } else {
                infer_data_type(&items)?
            };
            DataType::new_vlen(base).map_err(CoercionError::from)
        }
        Value::Compound(fields) => {
            let fields = fields
                .iter()
                .map(|(name, value)| {
                    infer_data_type(std::slice::from_ref(value))
                        .map(|data_type| CompoundField::new(name.clone(), data_type))
                })
                .collect::<Result<Vec<_>, _>>()?;
            DataType::new_compound(fields).map_err(CoercionError::from)
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for ArrayValue {
    fn from(values: Vec<T>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        Self {
            shape: vec![values.len() as u64],
            values,
            source_type: None,
        }
    }
}

impl From<Value> for ArrayValue {
    fn from(value: Value) -> Self {
        Self::scalar(value)
    }
}
