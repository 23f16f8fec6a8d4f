//! Turns a scan result into something to show the student.
//!
//! The presenter only decides words and buttons. It never touches the
//! camera or the store; by the time a result exists the camera is free.

use nipo_attendance::{RecordingError, ValidationError};
use nipo_capture::DeviceError;
use nipo_protocol::Material;
use serde::{Deserialize, Serialize};

use crate::{FailureReason, ScanResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Success,
    /// Nothing went wrong but nothing was recorded either.
    Neutral,
    /// The code was read but did not count.
    Warning,
    Error,
}

/// A button the student can press next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Scan again ([`ScanSession::retry`](crate::ScanSession::retry)).
    Retry,
    /// Leave the scanner ([`ScanSession::cancel`](crate::ScanSession::cancel)).
    Cancel,
    Done,
}

/// The result screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    pub tone: Tone,
    pub headline: String,
    pub detail: String,
    /// Stable identifier of the outcome, e.g. `expired-or-invalid`.
    pub reason: String,
    pub actions: Vec<Action>,
    /// Content unlocked by this attendance. Empty unless successful.
    pub materials: Vec<Material>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResultPresenter;

impl ResultPresenter {
    pub fn new() -> Self {
        Self
    }

    pub fn present(&self, result: &ScanResult) -> Presentation {
        match result {
            ScanResult::Success { session, receipt } => {
                let headline = if receipt.is_first_record() {
                    "You're checked in"
                } else {
                    "Already checked in"
                };
                Presentation {
                    tone: Tone::Success,
                    headline: headline.into(),
                    detail: format!("{} ({})", session.title, session.scheduled_on),
                    reason: "success".into(),
                    actions: vec![Action::Done],
                    materials: receipt.materials.clone(),
                }
            }
            ScanResult::Cancelled => Presentation {
                tone: Tone::Neutral,
                headline: "Scan cancelled".into(),
                detail: "Nothing was recorded.".into(),
                reason: "cancelled".into(),
                actions: vec![Action::Retry, Action::Done],
                materials: Vec::new(),
            },
            ScanResult::Failure(reason) => self.failure(reason),
        }
    }

    fn failure(&self, reason: &FailureReason) -> Presentation {
        let (tone, headline, detail) = match reason {
            FailureReason::Device(e) => (Tone::Error, device_headline(e), e.remediation()),
            FailureReason::Rejected(e) => (Tone::Warning, rejection_headline(e), rejection_detail(e)),
            FailureReason::Lookup(_) => (
                Tone::Error,
                "Could not check the code",
                "The attendance service did not answer. Check your connection and scan again.",
            ),
            FailureReason::Recording(RecordingError::Storage(_)) => (
                Tone::Error,
                "Attendance not saved",
                "Your code was valid but could not be saved. Scan again to retry.",
            ),
            FailureReason::Recording(RecordingError::Unlock(_)) => (
                Tone::Error,
                "Materials unavailable",
                "Your attendance may be saved but class materials could not be opened. Scan again to retry.",
            ),
        };

        Presentation {
            tone,
            headline: headline.into(),
            detail: detail.into(),
            reason: reason.reason().into(),
            actions: vec![Action::Retry, Action::Cancel],
            materials: Vec::new(),
        }
    }
}

fn device_headline(e: &DeviceError) -> &'static str {
    match e {
        DeviceError::PermissionDenied => "Camera access was denied",
        DeviceError::NotFound => "No camera found",
        DeviceError::Unsupported => "This camera can't scan codes",
    }
}

fn rejection_headline(e: &ValidationError) -> &'static str {
    match e {
        ValidationError::Malformed => "Not an attendance code",
        ValidationError::UnknownSession => "Unknown session",
        ValidationError::ExpiredOrInvalid => "This code has expired",
        ValidationError::Inactive => "Attendance is closed",
        ValidationError::PastSession => "This session is over",
    }
}

fn rejection_detail(e: &ValidationError) -> &'static str {
    match e {
        ValidationError::Malformed => "Point the camera at the code on the classroom screen.",
        ValidationError::UnknownSession => {
            "The code does not belong to any scheduled session. Ask your instructor."
        }
        ValidationError::ExpiredOrInvalid => "Scan the code currently on the classroom screen.",
        ValidationError::Inactive => "Your instructor has not opened attendance for this session.",
        ValidationError::PastSession => "Attendance can only be taken on the day of the session.",
    }
}
