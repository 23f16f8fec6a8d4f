//! Unified error type for Nipo.

use nipo_attendance::{IssueError, RecordingError};
use nipo_capture::DeviceError;
use nipo_protocol::ProtocolError;
use nipo_render::RenderError;
use nipo_store::StoreError;
use nipo_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Scan outcomes are not errors: a rejected code or a denied camera comes
/// back as a [`ScanResult`](crate::ScanResult). This type covers setup and
/// the instructor-side operations.
#[derive(Debug, thiserror::Error)]
pub enum NipoError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Recording(#[from] RecordingError),

    #[error(transparent)]
    Issue(#[from] IssueError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The display has no session open.
    #[error("no session is open on this display")]
    DisplayIdle,
}

#[cfg(test)]
mod tests {
    use nipo_protocol::SessionId;

    use super::*;

    #[test]
    fn test_from_store_error() {
        let err: NipoError = StoreError::NotFound(SessionId(4)).into();
        assert!(matches!(err, NipoError::Store(_)));
        assert!(err.to_string().contains("S-4"));
    }

    #[test]
    fn test_from_device_error() {
        let err: NipoError = DeviceError::PermissionDenied.into();
        assert!(matches!(err, NipoError::Device(DeviceError::PermissionDenied)));
        assert_eq!(err.to_string(), "permission-denied");
    }

    #[test]
    fn test_from_issue_error() {
        let err: NipoError = IssueError::NotFound(SessionId(9)).into();
        assert!(matches!(err, NipoError::Issue(_)));
    }

    #[test]
    fn test_from_transport_error() {
        let err: NipoError = TransportError::Shutdown.into();
        assert!(matches!(err, NipoError::Transport(_)));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: NipoError = ProtocolError::MalformedToken("x".into()).into();
        assert!(matches!(err, NipoError::Protocol(_)));
    }
}
