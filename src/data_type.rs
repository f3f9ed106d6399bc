//! Element types (type descriptors), values, and coercion.
//!
//! A [`DataType`] describes an element type and its byte representation.
//! Fixed-size types are stored as packed little-endian elements.
//! Variable-length strings and sequences are stored in chunks as a fixed-width reference into a heap region (see [`VLEN_REFERENCE_SIZE`]).
//!
//! Caller values enter through the tagged [`Value`] and [`ArrayValue`] types and are converted with [`encode_value`]/[`decode_value`].

mod coercion;
mod fill_value;
mod value;

pub use coercion::{decode_value, encode_value, CoercionError};
pub use fill_value::{FillValue, FillValueError};
pub use value::{ArrayValue, ArrayValueError, SourceType, Value};

use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ErrorKind;

/// The size in bytes of the on-chunk reference of a variable-length element: a heap offset and a length, both `u64`.
pub const VLEN_REFERENCE_SIZE: usize = 16;

/// A string character set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum Charset {
    /// 7-bit ASCII.
    #[display("ascii")]
    Ascii,
    /// UTF-8.
    #[display("utf-8")]
    Utf8,
}

/// A named field of a compound data type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompoundField {
    /// The field name.
    pub name: String,
    /// The field data type.
    pub data_type: DataType,
}

impl CompoundField {
    /// Create a new compound field.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// A named member of an enumerated data type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumMember {
    /// The member name.
    pub name: String,
    /// The member value.
    pub value: i64,
}

/// A data type (type descriptor).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum DataType {
    /// An integer of `width` bytes.
    Integer {
        /// The width in bytes (1, 2, 4, or 8).
        width: usize,
        /// True if signed.
        signed: bool,
    },
    /// An IEEE 754 floating point number of `width` bytes (2, 4, or 8).
    Float {
        /// The width in bytes.
        width: usize,
    },
    /// A null-padded fixed-length string.
    FixedString {
        /// The length in bytes.
        length: usize,
        /// The character set.
        charset: Charset,
    },
    /// A variable-length string.
    VarString {
        /// The character set.
        charset: Charset,
    },
    /// An ordered record of fixed-size fields.
    Compound {
        /// The fields in declaration order.
        fields: Vec<CompoundField>,
    },
    /// An enumeration over an integer base type.
    Enum {
        /// The base integer type.
        base: Box<DataType>,
        /// The name to value mapping.
        members: Vec<EnumMember>,
    },
    /// A variable-length sequence of a fixed-size numeric base type.
    VarLength {
        /// The element type.
        base: Box<DataType>,
    },
}

/// The size of a data type in memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataTypeSize {
    /// A fixed size (in bytes).
    Fixed(usize),
    /// A variable size.
    Variable,
}

/// A data type error.
#[derive(Clone, Debug, Error)]
pub enum DataTypeError {
    /// An unsupported width.
    #[error("unsupported width {0} for {1} data type")]
    InvalidWidth(usize, &'static str),
    /// An unrecognised data type code.
    #[error("unrecognised data type code {0}")]
    UnknownCode(String),
    /// A compound type with no fields, duplicate fields, or variable-length fields.
    #[error("invalid compound data type: {0}")]
    InvalidCompound(String),
    /// An enum base type that is not an integer.
    #[error("enum base type must be an integer, got {0}")]
    InvalidEnumBase(String),
    /// A variable-length base type that is not a fixed-size numeric type.
    #[error("variable-length base type must be a fixed-size numeric type, got {0}")]
    InvalidVarLengthBase(String),
    /// A field operation on a data type which is not compound.
    #[error("field names are only allowed for compound types, got {0}")]
    NotCompound(String),
    /// A field name that is not part of a compound type.
    #[error("field {0} does not exist in the compound type")]
    FieldNotFound(String),
    /// An enum lookup that failed.
    #[error("{0} is not a member of the enum")]
    EnumMemberNotFound(String),
}

impl DataTypeError {
    /// Returns the [`ErrorKind`] of the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FieldNotFound(_) | Self::EnumMemberNotFound(_) => ErrorKind::Value,
            _ => ErrorKind::Type,
        }
    }
}

/// A field of a compound type copied between a full compound element and a field view element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FieldCopy {
    pub(crate) full_offset: usize,
    pub(crate) view_offset: usize,
    pub(crate) size: usize,
}

/// A selection of fields of a compound data type.
///
/// A single field selects that field's data type, several fields select a compound of those fields in the requested order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSelection {
    names: Vec<String>,
    data_type: DataType,
    copies: Vec<FieldCopy>,
}

impl FieldSelection {
    /// The selected field names.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The data type of the selected fields.
    #[must_use]
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub(crate) fn copies(&self) -> &[FieldCopy] {
        &self.copies
    }
}

impl DataType {
    /// A signed 8-bit integer.
    #[must_use]
    pub const fn int8() -> Self {
        Self::Integer {
            width: 1,
            signed: true,
        }
    }

    /// A signed 16-bit integer.
    #[must_use]
    pub const fn int16() -> Self {
        Self::Integer {
            width: 2,
            signed: true,
        }
    }

    /// A signed 32-bit integer.
    #[must_use]
    pub const fn int32() -> Self {
        Self::Integer {
            width: 4,
            signed: true,
        }
    }

    /// A signed 64-bit integer.
    #[must_use]
    pub const fn int64() -> Self {
        Self::Integer {
            width: 8,
            signed: true,
        }
    }

    /// An unsigned 8-bit integer.
    #[must_use]
    pub const fn uint8() -> Self {
        Self::Integer {
            width: 1,
            signed: false,
        }
    }

    /// An unsigned 16-bit integer.
    #[must_use]
    pub const fn uint16() -> Self {
        Self::Integer {
            width: 2,
            signed: false,
        }
    }

    /// An unsigned 32-bit integer.
    #[must_use]
    pub const fn uint32() -> Self {
        Self::Integer {
            width: 4,
            signed: false,
        }
    }

    /// An unsigned 64-bit integer.
    #[must_use]
    pub const fn uint64() -> Self {
        Self::Integer {
            width: 8,
            signed: false,
        }
    }

    /// A half precision float.
    #[must_use]
    pub const fn float16() -> Self {
        Self::Float { width: 2 }
    }

    /// A single precision float.
    #[must_use]
    pub const fn float32() -> Self {
        Self::Float { width: 4 }
    }

    /// A double precision float.
    #[must_use]
    pub const fn float64() -> Self {
        Self::Float { width: 8 }
    }

    /// A fixed-length string of `length` bytes.
    #[must_use]
    pub const fn fixed_string(length: usize, charset: Charset) -> Self {
        Self::FixedString { length, charset }
    }

    /// A variable-length string.
    #[must_use]
    pub const fn vlen_string(charset: Charset) -> Self {
        Self::VarString { charset }
    }

    /// A boolean, stored as an 8-bit enum with members `FALSE` and `TRUE`.
    #[must_use]
    pub fn bool() -> Self {
        Self::Enum {
            base: Box::new(Self::int8()),
            members: vec![
                EnumMember {
                    name: "FALSE".to_string(),
                    value: 0,
                },
                EnumMember {
                    name: "TRUE".to_string(),
                    value: 1,
                },
            ],
        }
    }

    /// Create a new integer data type.
    ///
    /// # Errors
    /// Returns [`DataTypeError::InvalidWidth`] if `width` is not 1, 2, 4, or 8.
    pub fn new_integer(width: usize, signed: bool) -> Result<Self, DataTypeError> {
        if matches!(width, 1 | 2 | 4 | 8) {
            Ok(Self::Integer { width, signed })
        } else {
            Err(DataTypeError::InvalidWidth(width, "integer"))
        }
    }

    /// Create a new float data type.
    ///
    /// # Errors
    /// Returns [`DataTypeError::InvalidWidth`] if `width` is not 2, 4, or 8.
    pub fn new_float(width: usize) -> Result<Self, DataTypeError> {
        if matches!(width, 2 | 4 | 8) {
            Ok(Self::Float { width })
        } else {
            Err(DataTypeError::InvalidWidth(width, "float"))
        }
    }

    /// Create a new compound data type.
    ///
    /// # Errors
    /// Returns [`DataTypeError::InvalidCompound`] if there are no fields, field names are duplicated, or a field is not fixed-size.
    pub fn new_compound(fields: Vec<CompoundField>) -> Result<Self, DataTypeError> {
        let data_type = Self::Compound { fields };
        data_type.validate()?;
        Ok(data_type)
    }

    /// Create a new enum data type.
    ///
    /// # Errors
    /// Returns [`DataTypeError::InvalidEnumBase`] if `base` is not an integer.
    pub fn new_enum(
        base: DataType,
        members: impl IntoIterator<Item = (impl Into<String>, i64)>,
    ) -> Result<Self, DataTypeError> {
        let data_type = Self::Enum {
            base: Box::new(base),
            members: members
                .into_iter()
                .map(|(name, value)| EnumMember {
                    name: name.into(),
                    value,
                })
                .collect(),
        };
        data_type.validate()?;
        Ok(data_type)
    }

    /// Create a new variable-length sequence data type.
    ///
    /// # Errors
    /// Returns [`DataTypeError::InvalidVarLengthBase`] if `base` is not a fixed-size numeric type.
    pub fn new_vlen(base: DataType) -> Result<Self, DataTypeError> {
        let data_type = Self::VarLength {
            base: Box::new(base),
        };
        data_type.validate()?;
        Ok(data_type)
    }

    /// Parse a short data type code, such as `i4`, `u2`, `f8`, `f` (`f4`), `d` (`f8`), or `S10`.
    ///
    /// A leading byte order character (`<`, `=`, `|`) is ignored.
    ///
    /// # Errors
    /// Returns [`DataTypeError::UnknownCode`] if `code` is not recognised.
    pub fn from_code(code: &str) -> Result<Self, DataTypeError> {
        let unknown = || DataTypeError::UnknownCode(code.to_string());
        let trimmed = code.trim_start_matches(['<', '=', '|']);
        let mut chars = trimmed.chars();
        let class = chars.next().ok_or_else(unknown)?;
        let rest = chars.as_str();
        let width = || rest.parse::<usize>().map_err(|_| unknown());
        match (class, rest) {
            ('f', "") => Ok(Self::float32()),
            ('d', "") => Ok(Self::float64()),
            ('i', "") => Ok(Self::int32()),
            ('?', "") => Ok(Self::bool()),
            ('i', _) => Self::new_integer(width()?, true).map_err(|_| unknown()),
            ('u', _) => Self::new_integer(width()?, false).map_err(|_| unknown()),
            ('f', _) => Self::new_float(width()?).map_err(|_| unknown()),
            ('S', _) => match width()? {
                0 => Err(unknown()),
                length => Ok(Self::fixed_string(length, Charset::Ascii)),
            },
            _ => Err(unknown()),
        }
    }

    /// Validate the data type.
    ///
    /// # Errors
    /// Returns a [`DataTypeError`] if the data type (or a nested data type) is invalid.
    pub fn validate(&self) -> Result<(), DataTypeError> {
        match self {
            Self::Integer { width, signed } => Self::new_integer(*width, *signed).map(|_| ()),
            Self::Float { width } => Self::new_float(*width).map(|_| ()),
            Self::FixedString { length, .. } => {
                if *length == 0 {
                    Err(DataTypeError::InvalidWidth(0, "fixed-length string"))
                } else {
                    Ok(())
                }
            }
            Self::VarString { .. } => Ok(()),
            Self::Compound { fields } => {
                if fields.is_empty() {
                    return Err(DataTypeError::InvalidCompound(
                        "a compound type needs at least one field".to_string(),
                    ));
                }
                for (i, field) in fields.iter().enumerate() {
                    if fields[..i].iter().any(|f| f.name == field.name) {
                        return Err(DataTypeError::InvalidCompound(format!(
                            "duplicate field {}",
                            field.name
                        )));
                    }
                    field.data_type.validate()?;
                    if field.data_type.fixed_size().is_none() {
                        return Err(DataTypeError::InvalidCompound(format!(
                            "field {} is variable-length",
                            field.name
                        )));
                    }
                }
                Ok(())
            }
            Self::Enum { base, .. } => match base.as_ref() {
                Self::Integer { .. } => base.validate(),
                base => Err(DataTypeError::InvalidEnumBase(base.to_string())),
            },
            Self::VarLength { base } => match base.as_ref() {
                Self::Integer { .. } | Self::Float { .. } | Self::Enum { .. } => base.validate(),
                base => Err(DataTypeError::InvalidVarLengthBase(base.to_string())),
            },
        }
    }

    /// Returns the size of the data type in memory.
    #[must_use]
    pub fn size(&self) -> DataTypeSize {
        self.fixed_size()
            .map_or(DataTypeSize::Variable, DataTypeSize::Fixed)
    }

    /// Returns the size of the data type in bytes if it is fixed-size.
    #[must_use]
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            Self::Integer { width, .. } | Self::Float { width } => Some(*width),
            Self::FixedString { length, .. } => Some(*length),
            Self::Compound { fields } => fields
                .iter()
                .map(|field| field.data_type.fixed_size())
                .sum(),
            Self::Enum { base, .. } => base.fixed_size(),
            Self::VarString { .. } | Self::VarLength { .. } => None,
        }
    }

    /// Returns the size in bytes of one element in a stored chunk.
    ///
    /// This is the fixed size, or [`VLEN_REFERENCE_SIZE`] for variable-length types.
    #[must_use]
    pub fn stored_size(&self) -> usize {
        self.fixed_size().unwrap_or(VLEN_REFERENCE_SIZE)
    }

    /// Returns true if the data type is an integer or float.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer { .. } | Self::Float { .. })
    }

    /// Returns true if the data type is a fixed or variable-length string.
    #[must_use]
    pub fn is_string(&self) -> bool {
        matches!(self, Self::FixedString { .. } | Self::VarString { .. })
    }

    /// Returns the character set of a string data type.
    #[must_use]
    pub fn charset(&self) -> Option<Charset> {
        match self {
            Self::FixedString { charset, .. } | Self::VarString { charset } => Some(*charset),
            _ => None,
        }
    }

    /// Returns the fields of a compound data type with their byte offsets.
    #[must_use]
    pub fn field_offsets(&self) -> Option<Vec<(&CompoundField, usize)>> {
        if let Self::Compound { fields } = self {
            let mut offset = 0;
            Some(
                fields
                    .iter()
                    .map(|field| {
                        let field_offset = offset;
                        offset += field.data_type.stored_size();
                        (field, field_offset)
                    })
                    .collect(),
            )
        } else {
            None
        }
    }

    /// Select `names` from a compound data type.
    ///
    /// # Errors
    /// Returns [`DataTypeError::NotCompound`] if the data type is not compound, or [`DataTypeError::FieldNotFound`] if a name is not a field.
    pub fn select_fields(&self, names: &[String]) -> Result<FieldSelection, DataTypeError> {
        let offsets = self
            .field_offsets()
            .ok_or_else(|| DataTypeError::NotCompound(self.to_string()))?;
        if names.is_empty() {
            return Err(DataTypeError::FieldNotFound(String::new()));
        }
        let mut copies = Vec::with_capacity(names.len());
        let mut fields = Vec::with_capacity(names.len());
        let mut view_offset = 0;
        for name in names {
            let (field, full_offset) = offsets
                .iter()
                .find(|(field, _)| &field.name == name)
                .ok_or_else(|| DataTypeError::FieldNotFound(name.clone()))?;
            let size = field.data_type.stored_size();
            copies.push(FieldCopy {
                full_offset: *full_offset,
                view_offset,
                size,
            });
            fields.push((*field).clone());
            view_offset += size;
        }
        let data_type = if fields.len() == 1 {
            fields.remove(0).data_type
        } else {
            Self::new_compound(fields)?
        };
        Ok(FieldSelection {
            names: names.to_vec(),
            data_type,
            copies,
        })
    }

    /// Returns the name of the enum member with `value`.
    ///
    /// # Errors
    /// Returns [`DataTypeError::InvalidEnumBase`] if the data type is not an enum or [`DataTypeError::EnumMemberNotFound`] if no member has `value`.
    pub fn enum_name(&self, value: i64) -> Result<&str, DataTypeError> {
        match self {
            Self::Enum { members, .. } => members
                .iter()
                .find(|member| member.value == value)
                .map(|member| member.name.as_str())
                .ok_or_else(|| DataTypeError::EnumMemberNotFound(value.to_string())),
            _ => Err(DataTypeError::InvalidEnumBase(self.to_string())),
        }
    }

    /// Returns the value of the enum member `name`.
    ///
    /// # Errors
    /// Returns [`DataTypeError::InvalidEnumBase`] if the data type is not an enum or [`DataTypeError::EnumMemberNotFound`] if there is no member `name`.
    pub fn enum_value(&self, name: &str) -> Result<i64, DataTypeError> {
        match self {
            Self::Enum { members, .. } => members
                .iter()
                .find(|member| member.name == name)
                .map(|member| member.value)
                .ok_or_else(|| DataTypeError::EnumMemberNotFound(name.to_string())),
            _ => Err(DataTypeError::InvalidEnumBase(self.to_string())),
        }
    }

    /// Returns true if every value of `other` can be represented by this data type without loss.
    ///
    /// For example, a 32-bit integer can losslessly represent a 16-bit integer, and a double can represent a 32-bit integer.
    #[must_use]
    pub fn can_losslessly_represent(&self, other: &DataType) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (
                Self::Integer { width, signed },
                Self::Integer {
                    width: other_width,
                    signed: other_signed,
                },
            ) => match (signed, other_signed) {
                (true, true) | (false, false) => width >= other_width,
                (true, false) => width > other_width,
                (false, true) => false,
            },
            (Self::Float { width }, Self::Float { width: other_width }) => width >= other_width,
            (
                Self::Float { width },
                Self::Integer {
                    width: other_width,
                    signed,
                },
            ) => {
                let mantissa_bits = match *width {
                    2 => 11,
                    4 => 24,
                    _ => 53,
                };
                other_width * 8 - usize::from(*signed) <= mantissa_bits
            }
            (Self::Enum { base, .. }, other) => base.can_losslessly_represent(other),
            (_, Self::Enum { base, .. }) => self.can_losslessly_represent(base),
            (
                Self::FixedString { length, charset },
                Self::FixedString {
                    length: other_length,
                    charset: other_charset,
                },
            ) => charset == other_charset && length >= other_length,
            (Self::VarLength { base }, Self::VarLength { base: other_base }) => {
                base.can_losslessly_represent(other_base)
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer { width, signed } => {
                write!(f, "{}{width}", if *signed { 'i' } else { 'u' })
            }
            Self::Float { width } => write!(f, "f{width}"),
            Self::FixedString { length, charset } => write!(f, "S{length} ({charset})"),
            Self::VarString { charset } => write!(f, "vlen str ({charset})"),
            Self::Compound { fields } => {
                write!(f, "{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.data_type)?;
                }
                write!(f, "}}")
            }
            Self::Enum { base, .. } => write!(f, "enum ({base})"),
            Self::VarLength { base } => write!(f, "vlen {base}"),
        }
    }
}

impl TryFrom<&str> for DataType {
    type Error = DataTypeError;

    fn try_from(code: &str) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}
