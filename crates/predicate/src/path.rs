use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Comparable;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldPathError {
    #[error("field path must not be empty")]
    Empty,
    #[error("field path `{path}` contains an empty segment")]
    EmptySegment { path: String },
}

/// Dotted path into a map/list value, e.g. `payload.items.0.sku`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn resolve<'a>(&self, root: &'a Comparable) -> Option<&'a Comparable> {
        self.0
            .iter()
            .try_fold(root, |node, segment| node.get(segment))
    }
}

impl FromStr for FieldPath {
    type Err = FieldPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(FieldPathError::Empty);
        }
        let segments: Vec<String> = trimmed.split('.').map(str::to_string).collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(FieldPathError::EmptySegment {
                path: trimmed.to_string(),
            });
        }
        Ok(Self(segments))
    }
}

impl TryFrom<String> for FieldPath {
    type Error = FieldPathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldPath> for String {
    fn from(value: FieldPath) -> Self {
        value.to_string()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_map_and_list_segments() {
        let root = Comparable::from(json!({ "payload": { "items": [{ "sku": "a-1" }] } }));
        let path: FieldPath = "payload.items.0.sku".parse().expect("path");
        assert_eq!(path.resolve(&root), Some(&Comparable::from("a-1")));
        let missing: FieldPath = "payload.items.3".parse().expect("path");
        assert_eq!(missing.resolve(&root), None);
    }

    #[test]
    fn rejects_malformed_paths() {
        assert_eq!("".parse::<FieldPath>(), Err(FieldPathError::Empty));
        assert!(matches!(
            "payload..id".parse::<FieldPath>(),
            Err(FieldPathError::EmptySegment { .. })
        ));
    }
}
