//! Error types for the event service

use diary_core::{ActorId, EventId, Operation, StorageError, ValidationError};
use thiserror::Error;

/// Errors returned by EventService operations
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The actor may not perform the operation on this event
    #[error("Actor {actor} may not {operation} event {id}")]
    Forbidden {
        actor: ActorId,
        id: EventId,
        operation: Operation,
    },

    /// No event with this id
    #[error("Event not found: {0}")]
    NotFound(EventId),

    /// Input failed field validation
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// One draft of a batch failed validation; nothing was written
    #[error("Draft {index} of batch is invalid: {source}")]
    InvalidBatch {
        index: usize,
        #[source]
        source: ValidationError,
    },

    /// The event changed after it was read
    #[error("Event {0} was modified by someone else")]
    Conflict(EventId),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ServiceError {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, ServiceError::Forbidden { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::Conflict(_))
    }

    /// Check for either kind of validation failure
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ServiceError::Validation(_) | ServiceError::InvalidBatch { .. }
        )
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
