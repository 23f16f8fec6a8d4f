//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, wrong types.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A string does not have the shape of a session token.
    #[error("malformed token: {0:?}")]
    MalformedToken(String),

    /// A token format definition is unusable.
    #[error("invalid token format: {0}")]
    InvalidFormat(String),
}
