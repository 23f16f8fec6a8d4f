use std::io;

use crate::ScreenId;

/// Errors from the transport and the display hub.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listening socket could not be opened.
    #[error("cannot listen: {0}")]
    Bind(#[source] io::Error),

    #[error("accept failed: {0}")]
    AcceptFailed(#[source] io::Error),

    /// A TCP client connected but never completed the WebSocket upgrade.
    #[error("websocket handshake failed: {0}")]
    Handshake(String),

    /// The screen went away.
    #[error("{0} disconnected")]
    ConnectionClosed(ScreenId),

    #[error("send failed: {0}")]
    SendFailed(#[source] io::Error),

    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] io::Error),

    /// The hub was shut down; nothing more can be published.
    #[error("display hub shut down")]
    Shutdown,
}
