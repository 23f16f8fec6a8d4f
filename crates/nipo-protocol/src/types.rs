//! Core data types shared by every Nipo layer.
//!
//! These mirror the rows the external data store keeps. The store itself
//! lives behind a trait in `nipo-store`; this module only defines shapes.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Primary key of a class session in the data store.
///
/// Newtype over `i64` so a `SessionId` can never be passed where a
/// [`StudentId`] is expected. `#[serde(transparent)]` keeps it a bare number
/// on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// Identity of an authenticated student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub i64);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A scheduled class against which attendance can be recorded.
///
/// The token fields form a tiny state machine driven by the issuer:
///
/// ```text
///   (no token) ──issue──→ active ──invalidate──→ inactive
///                           ↑  │                    │
///                           └──┴───────issue────────┘
/// ```
///
/// Reissuing overwrites `token`, so at most one token is ever live.
/// Invalidating leaves `token` in place and only flips `active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// Human-facing session number, embedded in the token.
    pub sequence: u64,
    pub title: String,
    pub scheduled_on: NaiveDate,
    pub active: bool,
    pub token: Option<String>,
    pub token_issued_at: Option<DateTime<Utc>>,
    pub token_invalidated_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Snapshot of the token-related columns.
    pub fn token_state(&self) -> TokenState {
        TokenState {
            token: self.token.clone(),
            active: self.active,
            issued_at: self.token_issued_at,
            invalidated_at: self.token_invalidated_at,
        }
    }

    /// Overwrites the token-related columns.
    pub fn apply_token_state(&mut self, state: TokenState) {
        self.token = state.token;
        self.active = state.active;
        self.token_issued_at = state.issued_at;
        self.token_invalidated_at = state.invalidated_at;
    }

    /// `true` when a token is stored and the session is accepting scans.
    pub fn is_live(&self) -> bool {
        self.active && self.token.is_some()
    }
}

/// The token and activation columns of a [`Session`], written as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenState {
    pub token: Option<String>,
    pub active: bool,
    pub issued_at: Option<DateTime<Utc>>,
    pub invalidated_at: Option<DateTime<Utc>>,
}

/// Fields an instructor supplies when scheduling a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    pub sequence: u64,
    pub title: String,
    pub scheduled_on: NaiveDate,
}

// ---------------------------------------------------------------------------
// Attendance
// ---------------------------------------------------------------------------

/// Durable proof that a student was validated present for a session.
///
/// Unique per `(session_id, student_id)`; the store refuses a second row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub session_id: SessionId,
    pub student_id: StudentId,
    pub recorded_at: DateTime<Utc>,
}

/// One item revealed to a student once their attendance is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Material {
    pub id: i64,
    pub title: String,
}

// =========================================================================
// Tests
// =========================================================================
