//! Error types for the store layer.

use nipo_protocol::{SessionId, StudentId};

/// Errors reported by a [`SessionStore`](crate::SessionStore) or
/// [`ContentUnlock`](crate::ContentUnlock) implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No session with this id exists.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// Attendance for this pair already exists. Callers that want
    /// at-most-once semantics treat this as success.
    #[error("attendance already recorded for {student_id} in {session_id}")]
    UniqueViolation {
        session_id: SessionId,
        student_id: StudentId,
    },

    /// Another session already uses this sequence number.
    #[error("sequence {0} is already taken")]
    DuplicateSequence(u64),

    /// The backing store could not be reached or refused the operation.
    /// Transient: retrying may succeed.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// `true` for errors worth retrying without changing the request.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
