//! Node paths and names.
//!
//! Every group and dataset in a store is a node addressed by a [`NodePath`], such as `/group/temperature`.

use derive_more::Display;
use thiserror::Error;

use crate::ErrorKind;

/// A node path.
///
/// A path always starts with `/`, and a non-root path does not end with `/` or contain empty names.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub struct NodePath(String);

/// An invalid node path.
#[derive(Clone, Debug, Error)]
#[error("invalid node path {0}")]
pub struct NodePathError(String);

/// A node name.
///
/// A name is non-empty, does not contain `/`, and is not `.` or `..`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub struct NodeName(String);

/// An invalid node name.
#[derive(Clone, Debug, Error)]
#[error("invalid node name {0}")]
pub struct NodeNameError(String);

impl NodePathError {
    /// Returns the [`ErrorKind`] of the error, always [`ErrorKind::Value`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Value
    }
}

impl NodeNameError {
    /// Returns the [`ErrorKind`] of the error, always [`ErrorKind::Value`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Value
    }
}

impl NodePath {
    /// Create a new node path from `path`.
    ///
    /// # Errors
    /// Returns [`NodePathError`] if `path` is not valid according to [`NodePath::validate`].
    pub fn new(path: &str) -> Result<Self, NodePathError> {
        if Self::validate(path) {
            Ok(Self(path.to_string()))
        } else {
            Err(NodePathError(path.to_string()))
        }
    }

    /// The root node.
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Extracts a string slice of the path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this is the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Return the name of the node, or [`None`] for the root.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        (!self.is_root()).then(|| self.0.rsplit('/').next().unwrap_or_default())
    }

    /// Return the path of the child `name`.
    #[must_use]
    pub fn child(&self, name: &NodeName) -> Self {
        if self.is_root() {
            Self(format!("/{name}"))
        } else {
            Self(format!("{}/{name}", self.0))
        }
    }

    /// Returns true if `path` is a valid node path.
    #[must_use]
    pub fn validate(path: &str) -> bool {
        path == "/"
            || (path.starts_with('/')
                && path[1..]
                    .split('/')
                    .all(NodeName::validate))
    }
}

impl TryFrom<&str> for NodePath {
    type Error = NodePathError;

    fn try_from(path: &str) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}

impl NodeName {
    /// Create a new node name from `name`.
    ///
    /// # Errors
    /// Returns [`NodeNameError`] if `name` is not valid according to [`NodeName::validate`].
    pub fn new(name: &str) -> Result<Self, NodeNameError> {
        if Self::validate(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(NodeNameError(name.to_string()))
        }
    }

    /// Extracts a string slice of the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if `name` is a valid node name.
    #[must_use]
    pub fn validate(name: &str) -> bool {
        !name.is_empty() && !name.contains('/') && name != "." && name != ".."
    }
}
