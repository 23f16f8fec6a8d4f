//! Code rendering and display refresh for Nipo.
//!
//! [`CodeRenderer`] turns a [`Session`](nipo_protocol::Session) into a
//! [`DisplayFrame`](nipo_protocol::DisplayFrame): the live token as a QR code
//! plus readable fallback text, or a placeholder when scanning is off.
//!
//! [`RefreshTask`] keeps one display current. It is an actor: a spawned task
//! that re-reads the session on the [`nipo_tick`] cadence, redraws to a
//! [`RenderSurface`] when the content changed, and answers commands sent
//! through its [`RefreshHandle`].
//!
//! ```text
//! RefreshHandle ──cmd──→ RefreshTask ──get_by_id──→ SessionStore
//!                            │
//!                            └──draw──→ RenderSurface
//! ```
//!
//! The task only reads the store. Token state is written by the issuer
//! alone, so a redraw can never undo an invalidation.

#![allow(async_fn_in_trait)]

mod error;
mod refresh;
mod renderer;
mod surface;

pub use error::RenderError;
pub use refresh::{RefreshHandle, RefreshTask};
pub use renderer::{CodeMatrix, CodeRenderer, ErrorCorrection, RenderConfig};
pub use surface::{MemorySurface, RenderSurface};
