//! The session store seam.
//!
//! Nipo reads and writes session rows through [`SessionStore`] instead of a
//! concrete database client. Production deployments implement it over the
//! platform's remote store; tests use [`MemoryStore`](crate::MemoryStore)
//! or wrap it to inject faults and count lookups.

use chrono::{DateTime, Utc};
use nipo_protocol::{
    AttendanceRecord, NewSession, Session, SessionId, StudentId, TokenState,
};

use crate::StoreError;

/// Access to sessions and attendance rows.
///
/// # Trait bounds
///
/// - `Send + Sync` → one store is shared by the issuer, validator, recorder
///   and refresh tasks, which may run on different worker threads.
/// - `'static` → it lives as long as the application.
///
/// Every method returns a `Send` future so callers can hold it across
/// `tokio::spawn` boundaries.
pub trait SessionStore: Send + Sync + 'static {
    /// Looks up a session by primary key.
    fn get_by_id(
        &self,
        id: SessionId,
    ) -> impl Future<Output = Result<Option<Session>, StoreError>> + Send;

    /// Looks up a session by the sequence number embedded in its token.
    fn get_by_sequence(
        &self,
        sequence: u64,
    ) -> impl Future<Output = Result<Option<Session>, StoreError>> + Send;

    /// Overwrites the token and activation columns of a session and returns
    /// the updated row.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if the session does not exist.
    fn update_token_state(
        &self,
        id: SessionId,
        state: TokenState,
    ) -> impl Future<Output = Result<Session, StoreError>> + Send;

    /// Inserts an attendance row.
    ///
    /// # Errors
    /// - [`StoreError::UniqueViolation`]: a row for the pair already exists;
    ///   the existing row is left untouched
    /// - [`StoreError::NotFound`]: the session does not exist
    fn insert_attendance(
        &self,
        session_id: SessionId,
        student_id: StudentId,
        recorded_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<AttendanceRecord, StoreError>> + Send;

    /// Schedules a new session with no token.
    fn insert_session(
        &self,
        new: NewSession,
    ) -> impl Future<Output = Result<Session, StoreError>> + Send;

    /// All attendance rows for a session, oldest first.
    fn list_attendance(
        &self,
        session_id: SessionId,
    ) -> impl Future<Output = Result<Vec<AttendanceRecord>, StoreError>> + Send;
}
