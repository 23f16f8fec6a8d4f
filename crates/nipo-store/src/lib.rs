//! Data store collaborators for Nipo.
//!
//! Nipo doesn't own a database. The class-attendance platform already has
//! one, and everything here talks to it through two traits:
//!
//! 1. [`SessionStore`]: read sessions, write token state, insert attendance
//!    under a `(session_id, student_id)` uniqueness guarantee
//! 2. [`ContentUnlock`]: reveal materials once a student is marked present
//!
//! [`MemoryStore`] and [`MaterialCatalog`] are in-process implementations
//! used by tests and the projector demo.
//!
//! # How it fits in the stack
//!
//! ```text
//! Attendance / Render layers (above)  ← issue, validate, record, poll
//!     ↕
//! Store layer (this crate)            ← remote data store seam
//!     ↕
//! Protocol layer (below)              ← Session, AttendanceRecord, ids
//! ```

#![allow(async_fn_in_trait)]

mod error;
mod memory;
mod store;
mod unlock;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::SessionStore;
pub use unlock::{ContentUnlock, MaterialCatalog};
