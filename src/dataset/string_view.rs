use derive_more::Display;

use crate::{
    data_type::{CoercionError, Value},
    selection::Selection,
    ArrayShape,
};

use super::{Dataset, DatasetError};

/// A text codec used to decode string elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum TextCodec {
    /// 7-bit ASCII.
    #[display("ascii")]
    Ascii,
    /// UTF-8.
    #[display("utf-8")]
    Utf8,
    /// ISO 8859-1, every byte is a character.
    #[display("latin-1")]
    Latin1,
}

/// The handling of bytes which cannot be decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DecodeErrors {
    /// Fail with an [`ErrorKind::Encoding`](crate::ErrorKind::Encoding) error.
    #[default]
    Strict,
    /// Drop the bytes.
    Ignore,
    /// Substitute U+FFFD for the bytes.
    Replace,
}

/// Decode `bytes` as text with `codec`, handling invalid bytes according to `errors`.
///
/// # Errors
/// Returns [`CoercionError::Decode`] if `bytes` are invalid for `codec` and `errors` is [`DecodeErrors::Strict`].
pub fn decode_text(
    bytes: &[u8],
    codec: TextCodec,
    errors: DecodeErrors,
) -> Result<String, CoercionError> {
    let invalid = |reason: String| CoercionError::Decode {
        codec: match codec {
            TextCodec::Ascii => "ascii",
            TextCodec::Utf8 => "utf-8",
            TextCodec::Latin1 => "latin-1",
        },
        reason,
    };
    match codec {
        TextCodec::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        TextCodec::Ascii => {
            let mut text = String::with_capacity(bytes.len());
            for (position, &b) in bytes.iter().enumerate() {
                if b.is_ascii() {
                    text.push(char::from(b));
                } else {
                    match errors {
                        DecodeErrors::Strict => {
                            return Err(invalid(format!(
                                "byte {b:#04x} in position {position} is not ascii"
                            )))
                        }
                        DecodeErrors::Ignore => {}
                        DecodeErrors::Replace => text.push(char::REPLACEMENT_CHARACTER),
                    }
                }
            }
            Ok(text)
        }
        TextCodec::Utf8 => {
            let mut text = String::with_capacity(bytes.len());
            let mut remaining = bytes;
            loop {
                match std::str::from_utf8(remaining) {
                    Ok(valid) => {
                        text.push_str(valid);
                        return Ok(text);
                    }
                    Err(err) => {
                        let (valid, rest) = remaining.split_at(err.valid_up_to());
                        text.push_str(std::str::from_utf8(valid).unwrap_or_default());
                        match errors {
                            DecodeErrors::Strict => {
                                return Err(invalid(format!(
                                    "invalid byte sequence in position {}",
                                    bytes.len() - rest.len()
                                )))
                            }
                            DecodeErrors::Ignore => {}
                            DecodeErrors::Replace => text.push(char::REPLACEMENT_CHARACTER),
                        }
                        let skip = err.error_len().unwrap_or(rest.len());
                        remaining = &rest[skip..];
                    }
                }
            }
        }
    }
}

/// A lazy view of a string dataset which decodes elements as text.
///
/// Nothing is read until the view is indexed with [`StringView::read`].
/// The view can be read any number of times.
#[derive(Clone, Copy, Debug)]
pub struct StringView<'a> {
    dataset: &'a Dataset,
    codec: TextCodec,
    errors: DecodeErrors,
}

impl<'a> StringView<'a> {
    pub(super) fn new(dataset: &'a Dataset, codec: TextCodec, errors: DecodeErrors) -> Self {
        Self {
            dataset,
            codec,
            errors,
        }
    }

    /// Returns the text codec.
    #[must_use]
    pub fn codec(&self) -> TextCodec {
        self.codec
    }

    /// Returns the decode error handling.
    #[must_use]
    pub fn errors(&self) -> DecodeErrors {
        self.errors
    }

    /// Returns the shape of the underlying dataset.
    #[must_use]
    pub fn shape(&self) -> Option<ArrayShape> {
        self.dataset.shape()
    }

    /// Read and decode the elements of `selection` in row-major order.
    ///
    /// # Errors
    /// Returns a [`DatasetError`] if the read fails or an element cannot be decoded under [`DecodeErrors::Strict`].
    pub fn read(&self, selection: &Selection) -> Result<Vec<String>, DatasetError> {
        self.dataset
            .read(selection)?
            .to_values()?
            .into_iter()
            .map(|value| match value {
                Value::Bytes(bytes) => {
                    decode_text(&bytes, self.codec, self.errors).map_err(DatasetError::from)
                }
                value => Err(DatasetError::from(CoercionError::Incompatible {
                    value: value.variant_name(),
                    data_type: self.dataset.data_type().to_string(),
                })),
            })
            .collect()
    }
}
