use thiserror::Error;

use crate::{data_type::DataType, ErrorKind};

/// An element type error.
#[derive(Clone, Debug, Error)]
pub enum ElementError {
    /// The element type does not match the data type.
    #[error("the element type is incompatible with data type {0}")]
    IncompatibleDataType(String),
}

impl ElementError {
    /// Returns the [`ErrorKind`] of the error, always [`ErrorKind::Type`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Type
    }
}

/// A native element type which can be viewed from the little-endian bytes of a fixed-size numeric [`DataType`].
pub trait Element: bytemuck::Pod {
    /// Validate the data type.
    ///
    /// # Errors
    /// Returns an [`ElementError`] if the data type is incompatible with the element type.
    fn validate_data_type(data_type: &DataType) -> Result<(), ElementError>;

    /// Convert a single element from little-endian bytes.
    fn from_le_slice(bytes: &[u8]) -> Self;

    /// Convert packed little-endian element bytes into elements.
    #[must_use]
    fn from_le_bytes_vec(bytes: &[u8]) -> Vec<Self> {
        if cfg!(target_endian = "little") {
            bytemuck::pod_collect_to_vec(bytes)
        } else {
            bytes
                .chunks_exact(std::mem::size_of::<Self>())
                .map(Self::from_le_slice)
                .collect()
        }
    }
}

fn validate(data_type: &DataType, expected: &DataType) -> Result<(), ElementError> {
    let base = match data_type {
        DataType::Enum { base, .. } => base.as_ref(),
        data_type => data_type,
    };
    if base == expected {
        Ok(())
    } else {
        Err(ElementError::IncompatibleDataType(data_type.to_string()))
    }
}

macro_rules! impl_element {
    ($t:ty, $data_type:expr) => {
        impl Element for $t {
            fn validate_data_type(data_type: &DataType) -> Result<(), ElementError> {
                validate(data_type, &$data_type)
            }

            fn from_le_slice(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_le_bytes(buf)
            }
        }
    };
}

impl_element!(i8, DataType::int8());
impl_element!(i16, DataType::int16());
impl_element!(i32, DataType::int32());
impl_element!(i64, DataType::int64());
impl_element!(u8, DataType::uint8());
impl_element!(u16, DataType::uint16());
impl_element!(u32, DataType::uint32());
impl_element!(u64, DataType::uint64());
impl_element!(half::f16, DataType::float16());
impl_element!(f32, DataType::float32());
impl_element!(f64, DataType::float64());
