use serde::{Deserialize, Serialize};

/// The version of the group metadata document.
pub const GROUP_FORMAT_VERSION: u32 = 1;

/// Group metadata, stored as JSON at `<path>/.group`.
///
/// For example:
/// ```json
/// {
///     "format_version": 1
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GroupMetadata {
    /// The format version, always `1`.
    pub format_version: u32,
}

impl Default for GroupMetadata {
    fn default() -> Self {
        Self {
            format_version: GROUP_FORMAT_VERSION,
        }
    }
}

impl GroupMetadata {
    /// Returns true if the format version is supported.
    #[must_use]
    pub fn validate_format(&self) -> bool {
        self.format_version == GROUP_FORMAT_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_metadata_json() {
        let metadata: GroupMetadata = serde_json::from_str(r#"{"format_version": 1}"#).unwrap();
        assert_eq!(metadata, GroupMetadata::default());
        assert!(metadata.validate_format());
        assert!(serde_json::from_str::<GroupMetadata>(r#"{"format_version": 1, "x": 0}"#).is_err());
        let metadata: GroupMetadata = serde_json::from_str(r#"{"format_version": 2}"#).unwrap();
        assert!(!metadata.validate_format());
    }
}
