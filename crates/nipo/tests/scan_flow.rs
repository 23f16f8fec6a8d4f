//! End-to-end scan sessions: mock camera → validator → recorder → presenter.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use nipo::prelude::*;
use nipo_attendance::FixedClock;
use nipo_capture::{MockCamera, MockDecoder};
use nipo_protocol::{Material, NewSession, TokenState};

// =========================================================================
// Fixture
// =========================================================================

struct Classroom {
    store: Arc<MemoryStore>,
    catalog: Arc<MaterialCatalog>,
    clock: Arc<FixedClock>,
    issuer: TokenIssuer<MemoryStore>,
    session: Session,
}

async fn classroom() -> Classroom {
    let store = Arc::new(MemoryStore::new());
    let catalog = Arc::new(MaterialCatalog::new());
    let clock = Arc::new(FixedClock::at(
        Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap(),
    ));
    let session = store
        .insert_session(NewSession {
            sequence: 5,
            title: "Sistemas Operativos".into(),
            scheduled_on: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        })
        .await
        .unwrap();
    catalog
        .attach(
            session.id,
            vec![Material {
                id: 51,
                title: "Week 5 slides".into(),
            }],
        )
        .await;

    Classroom {
        issuer: TokenIssuer::new(store.clone(), TokenFormat::default(), clock.clone()),
        store,
        catalog,
        clock,
        session,
    }
}

type Scan = ScanSession<MockCamera, MockDecoder, MemoryStore, MaterialCatalog>;

impl Classroom {
    fn scanner(&self, student: i64, camera: &Arc<MockCamera>, decoder: MockDecoder) -> Scan {
        let clock: Arc<dyn Clock> = self.clock.clone();
        ScanSession::new(
            StudentId(student),
            CaptureLoop::new(camera.clone(), Arc::new(decoder), CameraRequest::default()),
            CodeValidator::new(self.store.clone(), TokenFormat::default(), clock.clone()),
            AttendanceRecorder::new(self.store.clone(), self.catalog.clone(), clock),
        )
    }

    /// A scanner whose camera sees `payload` in its third frame.
    fn scanner_seeing(&self, student: i64, payload: &str) -> (Scan, Arc<MockCamera>) {
        let camera = Arc::new(MockCamera::new());
        let scan = self.scanner(student, &camera, MockDecoder::never().hit_on(2, payload));
        (scan, camera)
    }

    async fn set_token(&self, token: &str, active: bool) {
        self.store
            .update_token_state(
                self.session.id,
                TokenState {
                    token: Some(token.into()),
                    active,
                    issued_at: Some(self.clock.now()),
                    invalidated_at: None,
                },
            )
            .await
            .unwrap();
    }
}

fn rejected(result: &ScanResult) -> ValidationError {
    match result {
        ScanResult::Failure(FailureReason::Rejected(reason)) => *reason,
        other => panic!("expected a rejection, got {other:?}"),
    }
}

async fn until_streaming(camera: &MockCamera) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while camera.open_streams() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("camera should open");
}

// =========================================================================
// Accepted codes
// =========================================================================

#[tokio::test]
async fn test_scan_canonical_code_records_once() {
    let room = classroom().await;
    room.set_token("NIPO_AULA_5", true).await;
    let (mut scan, camera) = room.scanner_seeing(7, "NIPO_AULA_5");

    let result = scan.scan().await;

    let ScanResult::Success { session, receipt } = &result else {
        panic!("expected success, got {result:?}");
    };
    assert_eq!(session.id, room.session.id);
    assert!(receipt.is_first_record());
    assert_eq!(receipt.materials[0].title, "Week 5 slides");
    assert_eq!(room.store.attendance_count().await, 1);
    assert!(room.catalog.is_unlocked(room.session.id, StudentId(7)).await);
    assert_eq!(camera.open_streams(), 0);
}

#[tokio::test]
async fn test_scan_issued_code_accepted() {
    let room = classroom().await;
    let token = room.issuer.issue(room.session.id).await.unwrap().token.unwrap();
    let (mut scan, _camera) = room.scanner_seeing(7, &token);

    assert!(scan.scan().await.is_success());
}

#[tokio::test]
async fn test_scan_stops_camera_before_validation() {
    let room = classroom().await;
    room.set_token("NIPO_AULA_5", true).await;
    let (mut scan, _camera) = room.scanner_seeing(7, "NIPO_AULA_5");

    scan.scan().await;

    let report = scan.last_capture().unwrap();
    assert_eq!(report.trail.last(), Some(&ScanState::Stopped));
    assert!(report.visited(ScanState::Detected));
    assert_eq!(report.frames, 3);
}

// =========================================================================
// Rejected codes
// =========================================================================

#[tokio::test]
async fn test_scan_old_code_after_reissue_expired_or_invalid() {
    let room = classroom().await;
    let old = room.issuer.issue(room.session.id).await.unwrap().token.unwrap();
    room.issuer.issue(room.session.id).await.unwrap();
    let (mut scan, _camera) = room.scanner_seeing(7, &old);

    let result = scan.scan().await;

    assert_eq!(rejected(&result), ValidationError::ExpiredOrInvalid);
    assert_eq!(room.store.attendance_count().await, 0);
}

#[tokio::test]
async fn test_scan_after_invalidate_inactive() {
    let room = classroom().await;
    let token = room.issuer.issue(room.session.id).await.unwrap().token.unwrap();
    room.issuer.invalidate(room.session.id).await.unwrap();
    let (mut scan, _camera) = room.scanner_seeing(7, &token);

    assert_eq!(rejected(&scan.scan().await), ValidationError::Inactive);
}

#[tokio::test]
async fn test_scan_unrelated_qr_malformed() {
    let room = classroom().await;
    room.set_token("NIPO_AULA_5", true).await;
    let (mut scan, _camera) = room.scanner_seeing(7, "garbage123");

    assert_eq!(rejected(&scan.scan().await), ValidationError::Malformed);
}

#[tokio::test]
async fn test_scan_day_after_session_past_session() {
    let room = classroom().await;
    room.set_token("NIPO_AULA_5", true).await;
    room.clock.advance(chrono::Duration::days(1));
    let (mut scan, _camera) = room.scanner_seeing(7, "NIPO_AULA_5");

    assert_eq!(rejected(&scan.scan().await), ValidationError::PastSession);
}

#[tokio::test]
async fn test_submit_typed_code_with_whitespace_accepted() {
    let room = classroom().await;
    room.set_token("NIPO_AULA_5", true).await;
    let camera = Arc::new(MockCamera::new());
    let mut scan = room.scanner(7, &camera, MockDecoder::never());

    assert!(scan.submit("  NIPO_AULA_5\n").await.is_success());
    assert_eq!(camera.opened(), 0);
}

// =========================================================================
// Camera failures
// =========================================================================

#[tokio::test]
async fn test_permission_denied_never_streams() {
    let room = classroom().await;
    let camera = Arc::new(MockCamera::new().denying());
    let mut scan = room.scanner(7, &camera, MockDecoder::never());

    let result = scan.scan().await;

    assert_eq!(
        result,
        ScanResult::Failure(FailureReason::Device(DeviceError::PermissionDenied))
    );
    assert!(!scan.last_capture().unwrap().visited(ScanState::Streaming));
    assert_eq!(camera.opened(), 0);

    let view = ResultPresenter::new().present(&result);
    assert_eq!(view.reason, "permission-denied");
    assert_eq!(view.actions, vec![Action::Retry, Action::Cancel]);
}

// =========================================================================
// Duplicates
// =========================================================================

#[tokio::test]
async fn test_concurrent_duplicate_scans_store_one_record() {
    let room = classroom().await;
    room.set_token("NIPO_AULA_5", true).await;
    let (mut phone, _a) = room.scanner_seeing(7, "NIPO_AULA_5");
    let (mut laptop, _b) = room.scanner_seeing(7, "NIPO_AULA_5");

    let (first, second) = tokio::join!(phone.scan(), laptop.scan());

    let receipts: Vec<_> = [first, second]
        .into_iter()
        .map(|r| match r {
            ScanResult::Success { receipt, .. } => receipt,
            other => panic!("expected success, got {other:?}"),
        })
        .collect();
    assert_eq!(receipts.iter().filter(|r| r.is_first_record()).count(), 1);
    assert_eq!(room.store.attendance_count().await, 1);
}

#[tokio::test]
async fn test_rescan_after_success_is_noop_success() {
    let room = classroom().await;
    room.set_token("NIPO_AULA_5", true).await;
    let (mut scan, camera) = room.scanner_seeing(7, "NIPO_AULA_5");

    let first = scan.scan().await;
    let second = scan.retry().await;

    assert!(first.is_success());
    let ScanResult::Success { receipt, .. } = &second else {
        panic!("expected success, got {second:?}");
    };
    assert_eq!(receipt.outcome, RecordOutcome::AlreadyRecorded);
    assert_eq!(
        ResultPresenter::new().present(&second).headline,
        "Already checked in"
    );
    assert_eq!(room.store.attendance_count().await, 1);
    assert_eq!(scan.attempts(), 2);
    assert_eq!(camera.opened(), 2);
}

// =========================================================================
// Retry and cancel
// =========================================================================

#[tokio::test]
async fn test_retry_after_attendance_opens_succeeds() {
    let room = classroom().await;
    room.set_token("NIPO_AULA_5", false).await;
    let (mut scan, camera) = room.scanner_seeing(7, "NIPO_AULA_5");

    assert_eq!(rejected(&scan.scan().await), ValidationError::Inactive);
    room.set_token("NIPO_AULA_5", true).await;
    let retried = scan.retry().await;

    assert!(retried.is_success());
    assert_eq!(camera.opened(), 2);
    assert_eq!(camera.open_streams(), 0);
}

#[tokio::test]
async fn test_cancel_from_another_task_releases_camera() {
    let room = classroom().await;
    let camera = Arc::new(MockCamera::new());
    let mut scan = room.scanner(7, &camera, MockDecoder::never());
    let canceller = scan.canceller();

    let task = tokio::spawn(async move { scan.scan().await });
    until_streaming(&camera).await;

    canceller.cancel();
    assert_eq!(camera.open_streams(), 0);

    assert_eq!(task.await.unwrap(), ScanResult::Cancelled);
}

#[tokio::test]
async fn test_cancelled_session_does_not_open_camera() {
    let room = classroom().await;
    let camera = Arc::new(MockCamera::new());
    let mut scan = room.scanner(7, &camera, MockDecoder::never());

    scan.cancel();

    assert_eq!(scan.scan().await, ScanResult::Cancelled);
    assert_eq!(scan.retry().await, ScanResult::Cancelled);
    assert_eq!(scan.submit("NIPO_AULA_5").await, ScanResult::Cancelled);
    assert_eq!(camera.opened(), 0);
}

#[tokio::test]
async fn test_abandoned_scan_releases_camera() {
    let room = classroom().await;
    let camera = Arc::new(MockCamera::new());
    let mut scan = room.scanner(7, &camera, MockDecoder::never());

    let waited = tokio::time::timeout(Duration::from_millis(50), scan.scan()).await;

    assert!(waited.is_err());
    assert_eq!(camera.open_streams(), 0);
}

#[tokio::test]
async fn test_dropping_session_releases_camera() {
    let room = classroom().await;
    let camera = Arc::new(MockCamera::new());
    let scan = room.scanner(7, &camera, MockDecoder::never());
    let canceller = scan.canceller();

    drop(scan);

    assert!(canceller.is_cancelled());
    assert_eq!(camera.open_streams(), 0);
}
