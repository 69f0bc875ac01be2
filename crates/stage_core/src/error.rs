//! Runtime error taxonomy.
//!
//! All failures are local, recoverable conditions reported at the call
//! site; none leave the match relation or query caches partially updated.

use crate::entity::Entity;

/// Errors that can occur during world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The operation referenced an entity that was never created or has
    /// already been collected.
    #[error("unknown entity: {0}")]
    UnknownEntity(Entity),

    /// The operation referenced a schedule name that was not declared at
    /// world construction.
    #[error("unknown schedule: '{0}'")]
    UnknownSchedule(String),

    /// A system requires a resource kind with no registered factory.
    #[error("no factory registered for resource kind '{0}'")]
    UnknownResource(String),

    /// A mutating call occurred while a schedule run was in flight.
    #[error("mutation attempted during an in-flight schedule run")]
    ReentrantMutation,
}

/// A copyable discriminant for [`WorldError`], for callers that branch on
/// the kind of failure without destructuring its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownEntity,
    UnknownSchedule,
    UnknownResource,
    ReentrantMutation,
}

impl WorldError {
    /// Returns the discriminant for this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorldError::UnknownEntity(_) => ErrorKind::UnknownEntity,
            WorldError::UnknownSchedule(_) => ErrorKind::UnknownSchedule,
            WorldError::UnknownResource(_) => ErrorKind::UnknownResource,
            WorldError::ReentrantMutation => ErrorKind::ReentrantMutation,
        }
    }
}
