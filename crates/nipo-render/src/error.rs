//! Error types for the render layer.

use nipo_protocol::SessionId;
use nipo_store::StoreError;
use qrcode::types::QrError;

/// Errors from rendering a session or driving its display.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The token did not fit in a QR code at the configured level.
    #[error("could not encode token: {0}")]
    Encode(#[from] QrError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The session was deleted while its display was open.
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// The surface refused the frame (screen gone, socket closed).
    #[error("surface rejected frame: {0}")]
    Surface(String),

    /// The refresh task has stopped.
    #[error("refresh task for session {0} is not running")]
    Unavailable(SessionId),
}
