//! What a rendering surface is asked to draw.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::SessionId;

/// Whether the frame carries a scannable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    /// A live token is shown.
    Showing,
    /// The session has a token but scanning is switched off.
    Inactive,
    /// No token has been issued yet.
    NotIssued,
}

/// One redraw of the classroom display.
///
/// `code_rows` holds the QR code as unicode half-block text, one string per
/// terminal row, and is empty unless `status` is [`DisplayStatus::Showing`].
/// `revision` increases whenever the visible content changes, so remote
/// screens can skip identical redraws.
///
/// Serialized as a flat JSON object that browser clients read directly:
///
/// ```json
/// { "session_id": 3, "sequence": 5, "title": "Redes I",
///   "scheduled_on": "2026-10-19", "status": "showing",
///   "code_rows": ["█▀▀▀▀▀█ ..."], "fallback": "NIPO_AULA_5-…",
///   "revision": 2, "rendered_at": "2026-10-19T08:00:00Z" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayFrame {
    pub session_id: SessionId,
    pub sequence: u64,
    pub title: String,
    pub scheduled_on: NaiveDate,
    pub status: DisplayStatus,
    pub code_rows: Vec<String>,
    /// Readable text for manual entry, or a status message.
    pub fallback: String,
    pub revision: u64,
    pub rendered_at: DateTime<Utc>,
}

impl DisplayFrame {
    /// `true` if both frames would look the same on screen.
    pub fn same_content(&self, other: &Self) -> bool {
        self.session_id == other.session_id
            && self.title == other.title
            && self.scheduled_on == other.scheduled_on
            && self.status == other.status
            && self.code_rows == other.code_rows
            && self.fallback == other.fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn frame(revision: u64) -> DisplayFrame {
        DisplayFrame {
            session_id: SessionId(3),
            sequence: 5,
            title: "Redes I".into(),
            scheduled_on: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            status: DisplayStatus::Showing,
            code_rows: vec!["█▀█".into()],
            fallback: "NIPO_AULA_5".into(),
            revision,
            rendered_at: Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_same_content_ignores_revision_and_timestamp() {
        let a = frame(1);
        let mut b = frame(2);
        b.rendered_at = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();
        assert!(a.same_content(&b));

        b.status = DisplayStatus::Inactive;
        assert!(!a.same_content(&b));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_value(DisplayStatus::NotIssued).unwrap();
        assert_eq!(json, "not_issued");
    }
}
