//! In-process [`SessionStore`] backed by hash maps.
//!
//! Mirrors the guarantees the remote store gives: sequence numbers are
//! unique, and attendance is unique per `(session_id, student_id)`. The
//! uniqueness check and the insert happen under one write lock, so two
//! concurrent inserts for the same pair can never both succeed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use nipo_protocol::{
    AttendanceRecord, NewSession, Session, SessionId, StudentId, TokenState,
};
use tokio::sync::RwLock;

use crate::{SessionStore, StoreError};

#[derive(Default)]
struct Tables {
    sessions: HashMap<SessionId, Session>,
    /// Secondary index: sequence number → session id. Kept in sync with
    /// `sessions` so token resolution never scans.
    by_sequence: HashMap<u64, SessionId>,
    attendance: HashMap<(SessionId, StudentId), AttendanceRecord>,
    next_id: i64,
}

/// A [`SessionStore`] that lives in memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attendance rows across all sessions.
    pub async fn attendance_count(&self) -> usize {
        self.tables.read().await.attendance.len()
    }
}

impl SessionStore for MemoryStore {
    async fn get_by_id(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self.tables.read().await.sessions.get(&id).cloned())
    }

    async fn get_by_sequence(&self, sequence: u64) -> Result<Option<Session>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_sequence
            .get(&sequence)
            .and_then(|id| tables.sessions.get(id))
            .cloned())
    }

    async fn update_token_state(
        &self,
        id: SessionId,
        state: TokenState,
    ) -> Result<Session, StoreError> {
        let mut tables = self.tables.write().await;
        let session = tables.sessions.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        session.apply_token_state(state);
        tracing::debug!(session_id = %id, active = session.active, "token state updated");
        Ok(session.clone())
    }

    async fn insert_attendance(
        &self,
        session_id: SessionId,
        student_id: StudentId,
        recorded_at: DateTime<Utc>,
    ) -> Result<AttendanceRecord, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.sessions.contains_key(&session_id) {
            return Err(StoreError::NotFound(session_id));
        }

        let key = (session_id, student_id);
        if tables.attendance.contains_key(&key) {
            return Err(StoreError::UniqueViolation {
                session_id,
                student_id,
            });
        }

        let record = AttendanceRecord {
            session_id,
            student_id,
            recorded_at,
        };
        tables.attendance.insert(key, record.clone());
        tracing::debug!(%session_id, %student_id, "attendance row inserted");
        Ok(record)
    }

    async fn insert_session(&self, new: NewSession) -> Result<Session, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.by_sequence.contains_key(&new.sequence) {
            return Err(StoreError::DuplicateSequence(new.sequence));
        }

        tables.next_id += 1;
        let id = SessionId(tables.next_id);
        let session = Session {
            id,
            sequence: new.sequence,
            title: new.title,
            scheduled_on: new.scheduled_on,
            active: false,
            token: None,
            token_issued_at: None,
            token_invalidated_at: None,
        };

        // Insert into both maps to keep them in sync.
        tables.by_sequence.insert(session.sequence, id);
        tables.sessions.insert(id, session.clone());

        tracing::info!(session_id = %id, sequence = session.sequence, "session scheduled");
        Ok(session)
    }

    async fn list_attendance(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<AttendanceRecord> = tables
            .attendance
            .values()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.recorded_at, r.student_id));
        Ok(rows)
    }
}

// =========================================================================
// Tests
// =========================================================================
