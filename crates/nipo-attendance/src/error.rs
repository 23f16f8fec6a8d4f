//! Error and rejection types for the attendance layer.

use nipo_protocol::SessionId;
use nipo_store::StoreError;
use serde::{Deserialize, Serialize};

/// Why a decoded string was not accepted as proof of presence.
///
/// Returned inside [`Verdict::Rejected`](crate::Verdict::Rejected), not as an
/// `Err`: these are normal outcomes of scanning, and the presenter shows the
/// specific reason to the student.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error,
)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationError {
    /// Not shaped like a session token at all.
    #[error("malformed")]
    Malformed,

    /// Shaped right, but no session has that sequence number.
    #[error("unknown-session")]
    UnknownSession,

    /// The session exists but stores a different token (reissued or never
    /// issued).
    #[error("expired-or-invalid")]
    ExpiredOrInvalid,

    /// The token matches but scanning is switched off for the session.
    #[error("inactive")]
    Inactive,

    /// The session was scheduled before today.
    #[error("past-session")]
    PastSession,
}

impl ValidationError {
    /// Stable kebab-case identifier, same as `Display`.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::UnknownSession => "unknown-session",
            Self::ExpiredOrInvalid => "expired-or-invalid",
            Self::Inactive => "inactive",
            Self::PastSession => "past-session",
        }
    }
}

/// Recording failed for infrastructure reasons. The code itself was valid,
/// so the student should retry, not rescan a different code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordingError {
    /// The attendance insert did not go through.
    #[error("could not store attendance: {0}")]
    Storage(#[source] StoreError),

    /// Attendance may be stored but materials could not be unlocked.
    #[error("could not unlock materials: {0}")]
    Unlock(#[source] StoreError),
}

/// Errors from [`TokenIssuer`](crate::TokenIssuer).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IssueError {
    #[error("session {0} not found")]
    NotFound(SessionId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_matches_reason() {
        for err in [
            ValidationError::Malformed,
            ValidationError::UnknownSession,
            ValidationError::ExpiredOrInvalid,
            ValidationError::Inactive,
            ValidationError::PastSession,
        ] {
            assert_eq!(err.to_string(), err.reason());
        }
    }

    #[test]
    fn test_validation_error_serializes_kebab_case() {
        let json = serde_json::to_value(ValidationError::ExpiredOrInvalid).unwrap();
        assert_eq!(json, "expired-or-invalid");
    }

    #[test]
    fn test_recording_error_keeps_source() {
        use std::error::Error;
        let err = RecordingError::Storage(StoreError::Unavailable("timeout".into()));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("timeout"));
    }
}
