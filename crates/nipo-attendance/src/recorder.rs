//! At-most-once attendance recording.
//!
//! The store's uniqueness constraint on `(session_id, student_id)` is the
//! only guard against duplicates. Two devices, or two rapid submissions from
//! one device, may both reach [`AttendanceRecorder::record`]; one insert
//! wins and the other sees a unique violation, which is reported as
//! [`RecordOutcome::AlreadyRecorded`]. Both callers get a receipt.

use std::sync::Arc;

use nipo_protocol::{AttendanceRecord, Material, Session, SessionId, StudentId};
use nipo_store::{ContentUnlock, SessionStore, StoreError};
use serde::{Deserialize, Serialize};

use crate::{Clock, RecordingError};

/// What the insert did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordOutcome {
    Inserted(AttendanceRecord),
    /// A row already existed; nothing was written.
    AlreadyRecorded,
}

/// Proof handed back to the student after a successful scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReceipt {
    pub session_id: SessionId,
    pub student_id: StudentId,
    pub outcome: RecordOutcome,
    /// Materials now visible to the student.
    pub materials: Vec<Material>,
}

impl RecordReceipt {
    pub fn is_first_record(&self) -> bool {
        matches!(self.outcome, RecordOutcome::Inserted(_))
    }
}

/// Stores attendance and unlocks session content.
pub struct AttendanceRecorder<S, U> {
    store: Arc<S>,
    unlock: Arc<U>,
    clock: Arc<dyn Clock>,
}

impl<S: SessionStore, U: ContentUnlock> AttendanceRecorder<S, U> {
    pub fn new(store: Arc<S>, unlock: Arc<U>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            unlock,
            clock,
        }
    }

    /// Records `student_id` present for an already validated `session`.
    ///
    /// # Errors
    /// - [`RecordingError::Storage`]: the insert failed for a reason other
    ///   than the row already existing
    /// - [`RecordingError::Unlock`]: the row is stored but materials could
    ///   not be revealed; retrying is safe
    pub async fn record(
        &self,
        session: &Session,
        student_id: StudentId,
    ) -> Result<RecordReceipt, RecordingError> {
        let session_id = session.id;

        let outcome = match self
            .store
            .insert_attendance(session_id, student_id, self.clock.now())
            .await
        {
            Ok(record) => {
                tracing::info!(%session_id, %student_id, "attendance recorded");
                RecordOutcome::Inserted(record)
            }
            Err(StoreError::UniqueViolation { .. }) => {
                tracing::debug!(%session_id, %student_id, "attendance already recorded");
                RecordOutcome::AlreadyRecorded
            }
            Err(e) => {
                tracing::warn!(%session_id, %student_id, error = %e, "attendance insert failed");
                return Err(RecordingError::Storage(e));
            }
        };

        let materials = self
            .unlock
            .unlock(session_id, student_id)
            .await
            .map_err(|e| {
                tracing::warn!(%session_id, %student_id, error = %e, "content unlock failed");
                RecordingError::Unlock(e)
            })?;

        Ok(RecordReceipt {
            session_id,
            student_id,
            outcome,
            materials,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use nipo_protocol::NewSession;
    use nipo_store::{MaterialCatalog, MemoryStore};

    use super::*;
    use crate::FixedClock;

    async fn setup() -> (
        AttendanceRecorder<MemoryStore, MaterialCatalog>,
        Arc<MemoryStore>,
        Session,
    ) {
        let store = Arc::new(MemoryStore::new());
        let session = store
            .insert_session(NewSession {
                sequence: 5,
                title: "Redes I".into(),
                scheduled_on: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            })
            .await
            .unwrap();
        let catalog = Arc::new(MaterialCatalog::new());
        catalog
            .attach(
                session.id,
                vec![Material {
                    id: 1,
                    title: "Slides".into(),
                }],
            )
            .await;
        let clock = FixedClock::at(Utc.with_ymd_and_hms(2026, 10, 19, 8, 5, 0).unwrap());
        let recorder = AttendanceRecorder::new(store.clone(), catalog, Arc::new(clock));
        (recorder, store, session)
    }

    #[tokio::test]
    async fn test_record_first_time_inserts_and_unlocks() {
        let (recorder, store, session) = setup().await;

        let receipt = recorder.record(&session, StudentId(7)).await.unwrap();

        assert!(receipt.is_first_record());
        assert_eq!(receipt.materials.len(), 1);
        assert_eq!(store.attendance_count().await, 1);
    }

    #[tokio::test]
    async fn test_record_twice_second_is_noop_success() {
        let (recorder, store, session) = setup().await;

        let first = recorder.record(&session, StudentId(7)).await.unwrap();
        let second = recorder.record(&session, StudentId(7)).await.unwrap();

        assert!(first.is_first_record());
        assert_eq!(second.outcome, RecordOutcome::AlreadyRecorded);
        assert_eq!(second.materials, first.materials);
        assert_eq!(store.attendance_count().await, 1);
    }

    #[tokio::test]
    async fn test_record_missing_session_storage_error() {
        let (recorder, _store, mut session) = setup().await;
        session.id = SessionId(404);

        let result = recorder.record(&session, StudentId(7)).await;

        assert_eq!(
            result.unwrap_err(),
            RecordingError::Storage(StoreError::NotFound(SessionId(404)))
        );
    }
}
