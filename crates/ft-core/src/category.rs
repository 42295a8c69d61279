//! Dot-delimited hierarchical category names.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::ValidationError;

/// A hierarchical category such as `scene.intro`.
///
/// Stored as its segments; equality is structural. The empty path is the
/// root and only arises as the parent of a depth-1 path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CategoryPath {
    segments: Vec<String>,
}

impl CategoryPath {
    /// Parses a dotted category name.
    pub fn parse(path: &str) -> Result<Self, ValidationError> {
        let invalid = |reason| ValidationError::InvalidCategory {
            path: path.to_string(),
            reason,
        };
        if path.is_empty() {
            return Err(ValidationError::Empty { field: "category" });
        }
        if path.trim() != path {
            return Err(invalid("surrounding whitespace"));
        }
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(invalid("empty segment"));
        }
        Ok(Self { segments })
    }

    /// The root path, parent of every depth-1 category.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }

    /// The path without its last segment.
    #[must_use]
    pub fn parent(&self) -> Self {
        let keep = self.segments.len().saturating_sub(1);
        Self {
            segments: self.segments[..keep].to_vec(),
        }
    }

    /// Whether two categories belong to the same sibling group.
    #[must_use]
    pub fn is_sibling_of(&self, other: &Self) -> bool {
        let (a, b) = (self.segments.len(), other.segments.len());
        a == b && a > 0 && self.segments[..a - 1] == other.segments[..b - 1]
    }

    /// Whether `prefix` is this path or one of its ancestors.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl fmt::Display for CategoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl std::str::FromStr for CategoryPath {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CategoryPath {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Ok(Self::root());
        }
        Self::parse(&value)
    }
}

impl From<CategoryPath> for String {
    fn from(path: CategoryPath) -> Self {
        path.to_string()
    }
}
