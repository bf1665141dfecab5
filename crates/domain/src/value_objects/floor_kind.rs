//! Paintable floor terrain kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Maximum length of a floor kind tag
const MAX_FLOOR_KIND_LENGTH: usize = 32;

/// A validated floor kind tag (lowercase, `[a-z0-9_-]`, <=32 chars).
///
/// Viewers ship their own tile palettes, so the set of kinds is open; the
/// server only guarantees the tag is well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FloorKind(String);

impl FloorKind {
    /// Kind used for the default back-fill block.
    pub const DEFAULT: &'static str = "stone";

    /// Create a new validated floor kind.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the tag is empty, too long, or
    /// contains characters other than lowercase letters, digits, `_` and `-`.
    pub fn new(kind: impl Into<String>) -> Result<Self, DomainError> {
        let kind = kind.into().trim().to_ascii_lowercase();
        if kind.is_empty() {
            return Err(DomainError::validation("Floor kind cannot be empty"));
        }
        if kind.len() > MAX_FLOOR_KIND_LENGTH {
            return Err(DomainError::validation(format!(
                "Floor kind cannot exceed {} characters",
                MAX_FLOOR_KIND_LENGTH
            )));
        }
        if !kind
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(DomainError::validation(format!(
                "Floor kind contains invalid characters: {kind}"
            )));
        }
        Ok(Self(kind))
    }

    /// The default `stone` floor.
    pub fn stone() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FloorKind {
    fn default() -> Self {
        Self::stone()
    }
}

impl fmt::Display for FloorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for FloorKind {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<FloorKind> for String {
    fn from(kind: FloorKind) -> String {
        kind.0
    }
}
