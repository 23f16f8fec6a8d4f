//! Fan-out of display frames to projector screens.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{Connection, Transport, TransportError, WebSocketConnection, WebSocketTransport};

type Latest = Option<Arc<[u8]>>;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);
/// A screen that cannot take a frame for this long is dropped.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Accepts screens over WebSocket and keeps each one on the latest frame.
///
/// A screen that connects late gets the current frame right away. Screens
/// that fall behind skip straight to the newest frame; intermediate frames
/// are never queued. Anything a screen sends is ignored.
pub struct DisplayHub {
    local_addr: SocketAddr,
    latest: Arc<watch::Sender<Latest>>,
    screens: Arc<watch::Sender<usize>>,
    shutdown: CancellationToken,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl DisplayHub {
    /// Binds the hub and starts accepting screens.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let transport = WebSocketTransport::bind(addr).await?;
        let local_addr = transport.local_addr();

        let (latest, _) = watch::channel(None);
        let latest = Arc::new(latest);
        let (screens, _) = watch::channel(0usize);
        let screens = Arc::new(screens);
        let shutdown = CancellationToken::new();

        let accept_task = tokio::spawn(accept_loop(
            transport,
            Arc::clone(&latest),
            Arc::clone(&screens),
            shutdown.clone(),
        ));

        Ok(Self {
            local_addr,
            latest,
            screens,
            shutdown,
            accept_task: Mutex::new(Some(accept_task)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Replaces the frame every screen should show.
    ///
    /// Never waits on slow screens.
    pub fn publish(&self, frame: impl Into<Arc<[u8]>>) -> Result<(), TransportError> {
        if self.shutdown.is_cancelled() {
            return Err(TransportError::Shutdown);
        }
        self.latest.send_replace(Some(frame.into()));
        Ok(())
    }

    /// Connected screens.
    pub fn subscribers(&self) -> usize {
        *self.screens.borrow()
    }

    /// A receiver that sees the screen count change.
    pub fn watch_subscribers(&self) -> watch::Receiver<usize> {
        self.screens.subscribe()
    }

    /// Waits until at least `n` screens are connected.
    pub async fn wait_for_subscribers(&self, n: usize) {
        let mut rx = self.screens.subscribe();
        // The hub owns the sender, so this only ends once the count is reached.
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    /// Stops accepting, closes every screen and waits for them to go.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let task = self
            .accept_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "display hub accept task failed");
            }
        }

        let mut rx = self.screens.subscribe();
        let _ = rx.wait_for(|count| *count == 0).await;
        tracing::info!(addr = %self.local_addr, "display hub shut down");
    }
}

impl Drop for DisplayHub {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

async fn accept_loop(
    mut transport: WebSocketTransport,
    latest: Arc<watch::Sender<Latest>>,
    screens: Arc<watch::Sender<usize>>,
    shutdown: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            accepted = transport.accept() => accepted,
        };

        match accepted {
            Ok(conn) => {
                let rx = latest.subscribe();
                let guard = ScreenGuard::enter(Arc::clone(&screens));
                tokio::spawn(serve_screen(conn, rx, shutdown.clone(), guard));
            }
            Err(TransportError::AcceptFailed(e)) => {
                // Typically EMFILE.
                tracing::warn!(error = %e, "accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
            Err(e) => tracing::debug!(error = %e, "screen failed to connect"),
        }
    }
    tracing::debug!("display hub stopped accepting");
}

async fn serve_screen(
    conn: WebSocketConnection,
    mut latest: watch::Receiver<Latest>,
    shutdown: CancellationToken,
    _guard: ScreenGuard,
) {
    let id = conn.id();

    let current = latest.borrow_and_update().clone();
    if let Some(frame) = current {
        if !push(&conn, &frame, &shutdown).await {
            return;
        }
    }

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                match tokio::time::timeout(CLOSE_TIMEOUT, conn.close()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::debug!(%id, error = %e, "close failed"),
                    Err(_) => tracing::debug!(%id, "close timed out"),
                }
                break;
            }
            changed = latest.changed() => {
                if changed.is_err() {
                    break;
                }
                let frame = latest.borrow_and_update().clone();
                let Some(frame) = frame else { continue };
                if !push(&conn, &frame, &shutdown).await {
                    break;
                }
            }
            incoming = conn.recv() => match incoming {
                Ok(Some(data)) => tracing::trace!(%id, len = data.len(), "ignoring screen message"),
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(%id, error = %e, "screen receive failed");
                    break;
                }
            },
        }
    }
}

/// Sends one frame. Returns `false` when the screen should be dropped: the
/// send failed, stalled past [`SEND_TIMEOUT`] or was cut short by shutdown.
async fn push(conn: &WebSocketConnection, frame: &[u8], shutdown: &CancellationToken) -> bool {
    let id = conn.id();
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
            tracing::debug!(%id, "send abandoned on shutdown");
            false
        }
        sent = tokio::time::timeout(SEND_TIMEOUT, conn.send(frame)) => match sent {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::debug!(%id, error = %e, "screen send failed");
                false
            }
            Err(_) => {
                tracing::warn!(%id, "screen stalled, dropping it");
                false
            }
        },
    }
}

/// Counts a connected screen for as long as it lives.
struct ScreenGuard {
    screens: Arc<watch::Sender<usize>>,
}

impl ScreenGuard {
    fn enter(screens: Arc<watch::Sender<usize>>) -> Self {
        screens.send_modify(|count| *count += 1);
        tracing::info!(screens = *screens.borrow(), "screen connected");
        Self { screens }
    }
}

impl Drop for ScreenGuard {
    fn drop(&mut self) {
        self.screens
            .send_modify(|count| *count = count.saturating_sub(1));
        tracing::info!(screens = *self.screens.borrow(), "screen disconnected");
    }
}
