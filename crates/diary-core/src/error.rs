//! Error types for Diary

use std::fmt;

use thiserror::Error;

use crate::event::{EventId, Revision};

/// Errors related to actor identity
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Actor id must not be empty")]
    Empty,

    #[error("Actor id too long: max {max} chars, got {actual}")]
    TooLong { max: usize, actual: usize },
}

/// Errors raised by an event store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Event not found: {0}")]
    NotFound(EventId),

    /// Optimistic concurrency failure.
    ///
    /// `actual` is `None` when the record disappeared before the commit.
    #[error("Concurrency conflict on event {id}: expected revision {expected}, found {}", display_revision(.actual))]
    Conflict {
        id: EventId,
        expected: Revision,
        actual: Option<Revision>,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Database error: {0}")]
    Database(String),
}

fn display_revision(revision: &Option<Revision>) -> String {
    match revision {
        Some(r) => r.to_string(),
        None => "none".to_string(),
    }
}

impl StorageError {
    /// Check if this is an optimistic concurrency failure
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }

    /// Create a new Database error
    pub fn database(message: impl fmt::Display) -> Self {
        Self::Database(message.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// A single field that failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Name of the offending field
    pub field: &'static str,
    /// Human-readable reason
    pub message: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A draft or patch failed field constraints
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Validation failed: {}", join_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    /// Check if a given field is among the violations
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}
