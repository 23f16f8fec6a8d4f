//! Network transport for Nipo classroom screens.
//!
//! [`Transport`] and [`Connection`] describe how projector screens are
//! reached. [`WebSocketTransport`] implements them with `tokio-tungstenite`,
//! and [`DisplayHub`] builds on it to keep every connected screen showing
//! the latest published display frame.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport and the display hub

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod hub;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use hub::DisplayHub;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Identifies one connected screen for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScreenId(u64);

impl ScreenId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "screen-{}", self.0)
    }
}

/// Listens for screens.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Resolves with the next screen that finished connecting.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// The address actually bound, which differs from the requested one
    /// when binding port 0.
    fn local_addr(&self) -> SocketAddr;
}

/// One connected screen.
///
/// Sending and receiving lock separate halves, so one task can wait in
/// `recv` while another sends.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends a payload. Valid UTF-8 goes out as a text message so browser
    /// screens can `JSON.parse` it directly; anything else as binary.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Next message from the screen, or `Ok(None)` once it has closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ScreenId;
}
