//! Classroom display: issuing, closing and pushing frames to screens.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use futures_util::StreamExt;
use nipo::prelude::*;
use nipo_attendance::FixedClock;
use nipo_protocol::NewSession;
use nipo_render::MemorySurface;

// =========================================================================
// Helpers
// =========================================================================

async fn scheduled(store: &MemoryStore, sequence: u64) -> Session {
    store
        .insert_session(NewSession {
            sequence,
            title: format!("Session {sequence}"),
            scheduled_on: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        })
        .await
        .unwrap()
}

fn clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock::at(
        Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap(),
    ))
}

fn display<D: RenderSurface>(store: &Arc<MemoryStore>, surface: &Arc<D>) -> ClassroomDisplay<MemoryStore, D> {
    let config = NipoConfig {
        refresh: RefreshConfig::manual(),
        ..NipoConfig::default()
    };
    ClassroomDisplay::from_config(&config, store.clone(), surface.clone(), clock())
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn test_open_issues_token_and_shows_it() {
    let store = Arc::new(MemoryStore::new());
    let session = scheduled(&store, 5).await;
    let surface = Arc::new(MemorySurface::new());
    let mut display = display(&store, &surface);

    let frame = display.open(session.id).await.unwrap();

    let stored = store.get_by_id(session.id).await.unwrap().unwrap();
    assert_eq!(frame.status, DisplayStatus::Showing);
    assert_eq!(Some(frame.fallback.clone()), stored.token);
    assert!(!frame.code_rows.is_empty());
    assert_eq!(surface.last().unwrap().fallback, frame.fallback);
    assert_eq!(display.session_id(), Some(session.id));
}

#[tokio::test]
async fn test_reissue_changes_code_on_screen() {
    let store = Arc::new(MemoryStore::new());
    let session = scheduled(&store, 5).await;
    let surface = Arc::new(MemorySurface::new());
    let mut display = display(&store, &surface);

    let first = display.open(session.id).await.unwrap();
    let second = display.reissue().await.unwrap();

    assert_ne!(first.fallback, second.fallback);
    assert!(second.revision > first.revision);
}

#[tokio::test]
async fn test_close_takes_code_off_screen_immediately() {
    let store = Arc::new(MemoryStore::new());
    let session = scheduled(&store, 5).await;
    let surface = Arc::new(MemorySurface::new());
    let mut display = display(&store, &surface);
    let token = display.open(session.id).await.unwrap().fallback;

    let frame = display.close().await.unwrap();

    assert_eq!(frame.status, DisplayStatus::Inactive);
    assert!(frame.code_rows.is_empty());
    assert_eq!(surface.last().unwrap().status, DisplayStatus::Inactive);
    // The token stays stored; only activation changed.
    let stored = store.get_by_id(session.id).await.unwrap().unwrap();
    assert_eq!(stored.token, Some(token));
    assert!(!stored.active);
}

#[tokio::test]
async fn test_open_other_session_switches_screen() {
    let store = Arc::new(MemoryStore::new());
    let first = scheduled(&store, 5).await;
    let second = scheduled(&store, 6).await;
    let surface = Arc::new(MemorySurface::new());
    let mut display = display(&store, &surface);

    display.open(first.id).await.unwrap();
    let frame = display.open(second.id).await.unwrap();

    assert_eq!(frame.sequence, 6);
    assert_eq!(display.session_id(), Some(second.id));
    // The first session's code stays valid until closed.
    assert!(store.get_by_id(first.id).await.unwrap().unwrap().active);
}

#[tokio::test]
async fn test_reissue_without_open_is_idle_error() {
    let store = Arc::new(MemoryStore::new());
    let surface = Arc::new(MemorySurface::new());
    let mut display = display(&store, &surface);

    assert!(matches!(display.reissue().await, Err(NipoError::DisplayIdle)));
    assert!(matches!(display.close().await, Err(NipoError::DisplayIdle)));
}

#[tokio::test]
async fn test_open_unknown_session_fails_without_drawing() {
    let store = Arc::new(MemoryStore::new());
    let surface = Arc::new(MemorySurface::new());
    let mut display = display(&store, &surface);

    let err = display.open(SessionId(404)).await.unwrap_err();

    assert!(matches!(err, NipoError::Issue(_)));
    assert_eq!(surface.draw_count(), 0);
    assert_eq!(display.session_id(), None);
}

#[tokio::test]
async fn test_stop_leaves_token_valid() {
    let store = Arc::new(MemoryStore::new());
    let session = scheduled(&store, 5).await;
    let surface = Arc::new(MemorySurface::new());
    let mut display = display(&store, &surface);
    display.open(session.id).await.unwrap();

    display.stop().await;

    assert_eq!(display.session_id(), None);
    assert!(store.get_by_id(session.id).await.unwrap().unwrap().active);
}

// =========================================================================
// Remote screens
// =========================================================================

#[tokio::test]
async fn test_projector_screen_receives_frames_as_json() {
    let store = Arc::new(MemoryStore::new());
    let session = scheduled(&store, 5).await;
    let hub = Arc::new(DisplayHub::bind("127.0.0.1:0").await.unwrap());
    let surface = Arc::new(WsDisplaySurface::new(hub.clone()));
    let mut display = display(&store, &surface);

    let (mut screen, _) = tokio_tungstenite::connect_async(format!("ws://{}", hub.local_addr()))
        .await
        .unwrap();
    hub.wait_for_subscribers(1).await;
    let opened = display.open(session.id).await.unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let msg = screen.next().await.unwrap().unwrap();
            let frame: DisplayFrame = serde_json::from_slice(&msg.into_data()).unwrap();
            if frame.status == DisplayStatus::Showing {
                return frame;
            }
        }
    })
    .await
    .expect("screen should receive the code");

    assert_eq!(msg.fallback, opened.fallback);
    assert_eq!(msg.session_id, session.id);
    hub.shutdown().await;
}
