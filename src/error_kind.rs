use derive_more::Display;

/// The class of an error.
///
/// Every error type in this crate reports one of these classes with a `kind()` method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    /// A malformed shape, selection, fill value, or filter option.
    #[display("ValueError")]
    Value,
    /// A type or shape incompatibility, or an operation unsupported by the dataspace.
    #[display("TypeError")]
    Type,
    /// A text or byte charset violation.
    #[display("EncodingError")]
    Encoding,
    /// A numeric overflow on strict coercion.
    #[display("RangeError")]
    Range,
    /// A missing required filter option.
    #[display("ConfigurationError")]
    Configuration,
    /// A transport or data integrity failure.
    #[display("IOError")]
    Io,
}
