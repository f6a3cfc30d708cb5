//! Caller-facing error taxonomy.
//!
//! [`StorageError`] is what a backend reports. [`GraphError`] is what the
//! per-caller [`GraphClient`](crate::GraphClient) and everything built on it
//! returns: the backend variants plus the application-level
//! `ConsistencyViolation` and record validation failures.

use claimgraph::ValidationError;

use crate::storage::StorageError;

/// An error surfaced to callers of the claim graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A create collided with an existing record. Recoverable by lookup.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A claim endpoint does not resolve to an identity. Not retried.
    #[error("dangling reference: {0}")]
    DanglingReference(String),

    /// An invariant the application relies on does not hold in the stored
    /// data, e.g. a user linked to zero or several profile pointers.
    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),

    /// The record failed validation before reaching the store.
    #[error("invalid record: {0}")]
    Invalid(#[from] ValidationError),

    /// Opaque failure in the storage backend.
    #[error("backend error: {0}")]
    Backend(String),
}

impl GraphError {
    /// Whether the error is expected in normal operation and resolvable by
    /// looking up or re-reading. `DanglingReference`, `ConsistencyViolation`
    /// and validation failures are hard failures.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GraphError::Conflict(_) | GraphError::NotFound(_))
    }
}

impl From<StorageError> for GraphError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => GraphError::NotFound("not found".into()),
            StorageError::Conflict(msg) => GraphError::Conflict(msg),
            StorageError::DanglingReference(msg) => GraphError::DanglingReference(msg),
            StorageError::Internal(msg) => GraphError::Backend(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_keep_their_kind() {
        assert!(matches!(
            GraphError::from(StorageError::Conflict("x".into())),
            GraphError::Conflict(_)
        ));
        assert!(matches!(
            GraphError::from(StorageError::DanglingReference("x".into())),
            GraphError::DanglingReference(_)
        ));
        assert!(matches!(
            GraphError::from(StorageError::Internal("disk".into())),
            GraphError::Backend(_)
        ));
    }

    #[test]
    fn only_conflict_and_not_found_are_recoverable() {
        assert!(GraphError::Conflict("x".into()).is_recoverable());
        assert!(GraphError::NotFound("x".into()).is_recoverable());
        assert!(!GraphError::DanglingReference("x".into()).is_recoverable());
        assert!(!GraphError::ConsistencyViolation("x".into()).is_recoverable());
        assert!(!GraphError::Invalid(ValidationError::BlankDisplayName).is_recoverable());
        assert!(!GraphError::Backend("x".into()).is_recoverable());
    }
}
