//! Unified error type for the domain layer.
//!
//! Board mutations, value-object parsing, and fog admission all report
//! failures through [`DomainError`] so the engine can map them to protocol
//! replies without inspecting strings.

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Validation failed (e.g., invalid field values, no floor at target)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Entity not found
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Business rule violation
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Parse error (for value objects)
    #[error("Parse error: {0}")]
    Parse(String),

    /// A fog batch would push a level past its revealed-cell ceiling
    #[error("Fog capacity exceeded: {current} + {requested} > {max} cells")]
    FogCapacity {
        current: usize,
        requested: usize,
        max: usize,
    },
}

impl DomainError {
    /// Creates a validation error for business rule violations.
    ///
    /// # Example
    /// ```ignore
    /// if !floors.has_floor(&level_id, cell) {
    ///     return Err(DomainError::validation("No floor at target cell"));
    /// }
    /// ```
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Create a constraint violation error
    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }

    /// Creates a parse error for string-to-type conversion failures.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a fog capacity error
    pub fn fog_capacity(current: usize, requested: usize, max: usize) -> Self {
        Self::FogCapacity {
            current,
            requested,
            max,
        }
    }
}
