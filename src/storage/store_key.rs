use derive_more::{Display, From};
use thiserror::Error;

/// A store key.
///
/// A key is a non-empty string which neither starts nor ends with `/`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub struct StoreKey(String);

/// An invalid store key.
#[derive(Debug, From, Error)]
#[error("invalid store key {0}")]
pub struct StoreKeyError(String);

/// A list of [`StoreKey`].
pub type StoreKeys = Vec<StoreKey>;

impl StoreKey {
    /// Create a new store key from `key`.
    ///
    /// # Errors
    /// Returns [`StoreKeyError`] if `key` is not valid according to [`StoreKey::validate()`].
    pub fn new(key: impl Into<String>) -> Result<Self, StoreKeyError> {
        let key = key.into();
        if Self::validate(&key) {
            Ok(Self(key))
        } else {
            Err(StoreKeyError(key))
        }
    }

    /// Create a store key from a key built by this crate.
    pub(crate) fn new_unchecked(key: impl Into<String>) -> Self {
        let key = key.into();
        debug_assert!(Self::validate(&key));
        Self(key)
    }

    /// Extracts a string slice of the key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if `key` is a valid store key.
    #[must_use]
    pub fn validate(key: &str) -> bool {
        !key.starts_with('/') && !key.ends_with('/') && !key.is_empty()
    }

    /// Returns true if the key has prefix `prefix`.
    #[must_use]
    pub fn has_prefix(&self, prefix: &StorePrefix) -> bool {
        self.0.starts_with(prefix.as_str())
    }
}

impl TryFrom<&str> for StoreKey {
    type Error = StoreKeyError;

    fn try_from(key: &str) -> Result<Self, Self::Error> {
        Self::new(key)
    }
}

/// A store prefix.
///
/// A prefix is empty (the root) or ends with `/`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub struct StorePrefix(String);

impl StorePrefix {
    /// Create a new store prefix from `prefix`.
    ///
    /// # Errors
    /// Returns [`StoreKeyError`] if `prefix` is neither empty nor ends with `/`, or starts with `/`.
    pub fn new(prefix: impl Into<String>) -> Result<Self, StoreKeyError> {
        let prefix = prefix.into();
        if Self::validate(&prefix) {
            Ok(Self(prefix))
        } else {
            Err(StoreKeyError(prefix))
        }
    }

    pub(crate) fn new_unchecked(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        debug_assert!(Self::validate(&prefix));
        Self(prefix)
    }

    /// The root prefix.
    #[must_use]
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Extracts a string slice of the prefix.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if `prefix` is a valid store prefix.
    #[must_use]
    pub fn validate(prefix: &str) -> bool {
        prefix.is_empty() || (prefix.ends_with('/') && !prefix.starts_with('/'))
    }
}
