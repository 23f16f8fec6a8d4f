//! Shared vocabulary for Nipo.
//!
//! This crate defines what every other layer talks about:
//!
//! - **Types** ([`Session`], [`AttendanceRecord`], [`Material`], ids):
//!   the records the external data store hands back and forth.
//! - **Token** ([`TokenFormat`], [`ParsedToken`]): how a session-bound
//!   token is written and read back without a lookup.
//! - **Display** ([`DisplayFrame`]): what a rendering surface receives.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how display frames become
//!   bytes for remote screens.
//!
//! # Architecture
//!
//! ```text
//! Store / Issuer / Validator ─┐
//!                             ├─→ Protocol (this crate)
//! Renderer / Display hub ─────┘
//! ```
//!
//! The protocol layer knows nothing about cameras, stores, or sockets.

mod codec;
mod display;
mod error;
mod token;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use display::{DisplayFrame, DisplayStatus};
pub use error::ProtocolError;
pub use token::{ParsedToken, TokenFormat};
pub use types::{
    AttendanceRecord, Material, NewSession, Session, SessionId, StudentId,
    TokenState,
};
