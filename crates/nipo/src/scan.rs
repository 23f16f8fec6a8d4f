//! One student's scan session.
//!
//! ```text
//!  scan() ─→ capture ──Detected──→ validate ──Accepted──→ record ─→ Success
//!               │                     │                     │
//!               ├─DeviceError─→ Failure(Device)             └─✗─→ Failure(Recording)
//!               │                     ├─Rejected─→ Failure(Rejected)
//!               └─cancel─→ Cancelled  └─store ✗─→ Failure(Lookup)
//! ```
//!
//! The camera is released before validation starts, so nothing after
//! `Detected` holds a device. A session's [`CancellationToken`] scopes every
//! capture it starts and every store call it makes; after
//! [`ScanSession::cancel`] nothing this session started is still running.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nipo_attendance::{
    AttendanceRecorder, CodeValidator, RecordReceipt, RecordingError, ValidationError, Verdict,
};
use nipo_capture::{
    CameraDevice, CaptureCanceller, CaptureLoop, CaptureOutcome, CaptureReport, DeviceError,
    FrameDecoder,
};
use nipo_protocol::{Session, StudentId};
use nipo_store::{ContentUnlock, SessionStore, StoreError};
use tokio_util::sync::CancellationToken;

use crate::{NipoConfig, NipoError};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// How a scan ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    /// Attendance is stored (now or by an earlier scan).
    Success {
        session: Session,
        receipt: RecordReceipt,
    },
    Failure(FailureReason),
    /// The student backed out.
    Cancelled,
}

impl ScanResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Self::Failure(reason) => Some(reason),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Failure(reason) => reason.reason(),
            Self::Cancelled => "cancelled",
        }
    }
}

/// Why a scan failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    /// The camera could not be used.
    #[error("camera unavailable: {0}")]
    Device(DeviceError),

    /// A code was read but is not valid proof of presence.
    #[error("code rejected: {0}")]
    Rejected(ValidationError),

    /// The code could not be checked because the store failed.
    #[error("could not check code: {0}")]
    Lookup(StoreError),

    /// The code was valid but attendance could not be stored.
    #[error(transparent)]
    Recording(RecordingError),
}

impl FailureReason {
    /// Stable identifier for logs and clients.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Device(e) => e.reason(),
            Self::Rejected(e) => e.reason(),
            Self::Lookup(_) => "lookup-failed",
            Self::Recording(RecordingError::Storage(_)) => "recording-failed",
            Self::Recording(RecordingError::Unlock(_)) => "unlock-failed",
        }
    }

    /// `true` when scanning the same code again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Lookup(_) | Self::Recording(_))
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// The capture in flight, if any. Guarded so a cancel and a new capture
/// cannot interleave.
type CurrentCapture = Arc<Mutex<Option<CaptureCanceller>>>;

fn lock(current: &CurrentCapture) -> MutexGuard<'_, Option<CaptureCanceller>> {
    current.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ends a [`ScanSession`] from another task.
#[derive(Clone)]
pub struct ScanCanceller {
    scope: CancellationToken,
    current: CurrentCapture,
}

impl ScanCanceller {
    /// Ends the session. Any camera it holds is released before this
    /// returns, and pending validation or recording is abandoned.
    pub fn cancel(&self) {
        self.scope.cancel();
        if let Some(capture) = lock(&self.current).as_ref() {
            capture.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.scope.is_cancelled()
    }
}

impl fmt::Debug for ScanCanceller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanCanceller")
            .field("cancelled", &self.scope.is_cancelled())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Scans for one student on one device.
///
/// `scan` and `submit` take `&mut self`, so a device runs at most one
/// scan at a time. Duplicates across devices are settled by the store.
pub struct ScanSession<C, D, S, U> {
    student_id: StudentId,
    capture: CaptureLoop<C, D>,
    validator: CodeValidator<S>,
    recorder: AttendanceRecorder<S, U>,
    scope: CancellationToken,
    current: CurrentCapture,
    attempts: u32,
    last_capture: Option<CaptureReport>,
}

impl<C, D, S, U> ScanSession<C, D, S, U>
where
    C: CameraDevice,
    D: FrameDecoder,
    S: SessionStore,
    U: ContentUnlock,
{
    pub fn new(
        student_id: StudentId,
        capture: CaptureLoop<C, D>,
        validator: CodeValidator<S>,
        recorder: AttendanceRecorder<S, U>,
    ) -> Self {
        Self {
            student_id,
            capture,
            validator,
            recorder,
            scope: CancellationToken::new(),
            current: Arc::new(Mutex::new(None)),
            attempts: 0,
            last_capture: None,
        }
    }

    /// Wires a session from configuration.
    pub fn from_config(
        student_id: StudentId,
        config: &NipoConfig,
        camera: Arc<C>,
        decoder: Arc<D>,
        store: Arc<S>,
        unlock: Arc<U>,
    ) -> Result<Self, NipoError> {
        let clock = config.clock()?;
        Ok(Self::new(
            student_id,
            CaptureLoop::new(camera, decoder, config.camera.clone()),
            CodeValidator::new(Arc::clone(&store), config.token.clone(), Arc::clone(&clock)),
            AttendanceRecorder::new(store, unlock, clock),
        ))
    }

    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    /// Scans started so far, retries included.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// How the most recent capture went: states visited, frames seen.
    pub fn last_capture(&self) -> Option<&CaptureReport> {
        self.last_capture.as_ref()
    }

    pub fn canceller(&self) -> ScanCanceller {
        ScanCanceller {
            scope: self.scope.clone(),
            current: Arc::clone(&self.current),
        }
    }

    /// Ends the session. See [`ScanCanceller::cancel`].
    pub fn cancel(&self) {
        self.canceller().cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.scope.is_cancelled()
    }

    /// Opens the camera, waits for a code, then validates and records it.
    pub async fn scan(&mut self) -> ScanResult {
        self.attempts += 1;
        let student_id = self.student_id;
        tracing::info!(%student_id, attempt = self.attempts, "scan started");

        let handle = {
            let mut current = lock(&self.current);
            if self.scope.is_cancelled() {
                return ScanResult::Cancelled;
            }
            let handle = self.capture.start_with(self.scope.child_token());
            *current = Some(handle.canceller());
            handle
        };
        let report = handle.finish().await;
        lock(&self.current).take();

        tracing::debug!(
            %student_id,
            frames = report.frames,
            misses = report.misses,
            "capture finished"
        );
        let outcome = report.outcome.clone();
        self.last_capture = Some(report);
        let result = match outcome {
            CaptureOutcome::Detected(payload) => self.check(&payload).await,
            CaptureOutcome::Cancelled => ScanResult::Cancelled,
            CaptureOutcome::Failed(e) => ScanResult::Failure(FailureReason::Device(e)),
        };
        tracing::info!(%student_id, outcome = result.kind(), "scan finished");
        result
    }

    /// Starts over after a failure. The previous capture has already
    /// released the camera.
    pub async fn retry(&mut self) -> ScanResult {
        tracing::debug!(student_id = %self.student_id, "retrying scan");
        self.scan().await
    }

    /// Validates and records a code obtained some other way, such as typed
    /// in by hand.
    pub async fn submit(&mut self, raw: &str) -> ScanResult {
        if self.scope.is_cancelled() {
            return ScanResult::Cancelled;
        }
        let result = self.check(raw).await;
        tracing::info!(student_id = %self.student_id, outcome = result.kind(), "code submitted");
        result
    }

    async fn check(&self, payload: &str) -> ScanResult {
        let verdict = tokio::select! {
            biased;
            _ = self.scope.cancelled() => return ScanResult::Cancelled,
            verdict = self.validator.validate(payload) => verdict,
        };
        let session = match verdict {
            Ok(Verdict::Accepted(session)) => session,
            Ok(Verdict::Rejected(reason)) => {
                return ScanResult::Failure(FailureReason::Rejected(reason));
            }
            Err(e) => {
                tracing::warn!(error = %e, "validation lookup failed");
                return ScanResult::Failure(FailureReason::Lookup(e));
            }
        };

        let recorded = tokio::select! {
            biased;
            _ = self.scope.cancelled() => return ScanResult::Cancelled,
            recorded = self.recorder.record(&session, self.student_id) => recorded,
        };
        match recorded {
            Ok(receipt) => ScanResult::Success { session, receipt },
            Err(e) => ScanResult::Failure(FailureReason::Recording(e)),
        }
    }
}

impl<C, D, S, U> Drop for ScanSession<C, D, S, U> {
    fn drop(&mut self) {
        self.scope.cancel();
        if let Some(capture) = lock(&self.current).as_ref() {
            capture.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_retryable_only_for_infrastructure() {
        assert!(!FailureReason::Device(DeviceError::PermissionDenied).is_retryable());
        assert!(!FailureReason::Rejected(ValidationError::Malformed).is_retryable());
        assert!(FailureReason::Lookup(StoreError::Unavailable("down".into())).is_retryable());
        assert!(
            FailureReason::Recording(RecordingError::Storage(StoreError::Unavailable(
                "down".into()
            )))
            .is_retryable()
        );
    }

    #[test]
    fn test_failure_reason_identifiers() {
        assert_eq!(
            FailureReason::Device(DeviceError::PermissionDenied).reason(),
            "permission-denied"
        );
        assert_eq!(
            FailureReason::Rejected(ValidationError::ExpiredOrInvalid).reason(),
            "expired-or-invalid"
        );
        assert_eq!(
            FailureReason::Recording(RecordingError::Unlock(StoreError::Unavailable("x".into())))
                .reason(),
            "unlock-failed"
        );
    }
}
