//! Domain error type shared by every crate in the workspace.

use crate::types::DbId;

/// Errors raised by domain logic and repositories.
///
/// Filter incompleteness is deliberately absent: an unmet recipient filter
/// precondition resolves to an empty set, never to an error.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// No row of the given kind exists (or it is outside the caller's scope).
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// A single input value failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The operation conflicts with the entity's lifecycle state
    /// (e.g. editing a communication that was already sent).
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The caller's role does not permit the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
