//! Content unlock hook.
//!
//! Once a student is recorded present, the platform reveals that session's
//! materials to them. How it decides what to reveal is not Nipo's concern;
//! the recorder only calls [`ContentUnlock::unlock`] and passes the result on
//! to the presenter.

use std::collections::{HashMap, HashSet};

use nipo_protocol::{Material, SessionId, StudentId};
use tokio::sync::RwLock;

use crate::StoreError;

/// Reveals session materials to a student.
///
/// Implementations must be idempotent: the recorder calls `unlock` again
/// when a duplicate scan turns into a no-op insert.
pub trait ContentUnlock: Send + Sync + 'static {
    /// Returns the materials now visible to `student_id` for `session_id`.
    fn unlock(
        &self,
        session_id: SessionId,
        student_id: StudentId,
    ) -> impl Future<Output = Result<Vec<Material>, StoreError>> + Send;
}

/// In-memory [`ContentUnlock`]: a fixed catalog per session.
#[derive(Default)]
pub struct MaterialCatalog {
    materials: RwLock<HashMap<SessionId, Vec<Material>>>,
    unlocked: RwLock<HashSet<(SessionId, StudentId)>>,
}

impl MaterialCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the materials attached to a session.
    pub async fn attach(&self, session_id: SessionId, materials: Vec<Material>) {
        self.materials.write().await.insert(session_id, materials);
    }

    /// Whether `unlock` has been called for this pair.
    pub async fn is_unlocked(&self, session_id: SessionId, student_id: StudentId) -> bool {
        self.unlocked.read().await.contains(&(session_id, student_id))
    }
}

impl ContentUnlock for MaterialCatalog {
    async fn unlock(
        &self,
        session_id: SessionId,
        student_id: StudentId,
    ) -> Result<Vec<Material>, StoreError> {
        let first = self.unlocked.write().await.insert((session_id, student_id));
        if first {
            tracing::debug!(%session_id, %student_id, "materials unlocked");
        }
        Ok(self
            .materials
            .read()
            .await
            .get(&session_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unlock_returns_attached_materials() {
        let catalog = MaterialCatalog::new();
        let slides = Material {
            id: 1,
            title: "Slides".into(),
        };
        catalog.attach(SessionId(3), vec![slides.clone()]).await;

        let revealed = catalog.unlock(SessionId(3), StudentId(9)).await.unwrap();

        assert_eq!(revealed, vec![slides]);
        assert!(catalog.is_unlocked(SessionId(3), StudentId(9)).await);
        assert!(!catalog.is_unlocked(SessionId(3), StudentId(8)).await);
    }

    #[tokio::test]
    async fn test_unlock_without_materials_is_empty_and_repeatable() {
        let catalog = MaterialCatalog::new();

        let first = catalog.unlock(SessionId(1), StudentId(1)).await.unwrap();
        let second = catalog.unlock(SessionId(1), StudentId(1)).await.unwrap();

        assert!(first.is_empty());
        assert_eq!(first, second);
    }
}
