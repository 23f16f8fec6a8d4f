//! Refresh actor: keeps one classroom display current.
//!
//! The task polls the session on the [`RefreshScheduler`] cadence and
//! redraws when what the surface would show has changed. It owns its own
//! [`CancellationToken`]; stopping a display never touches a scan in
//! progress on a student's device, and the reverse.

use std::sync::Arc;

use nipo_protocol::{DisplayFrame, SessionId};
use nipo_store::SessionStore;
use nipo_tick::{RefreshConfig, RefreshScheduler};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{CodeRenderer, RenderError, RenderSurface};

const COMMAND_BUFFER: usize = 16;

pub(crate) enum RefreshCommand {
    /// Re-read and redraw now, even if nothing changed.
    RefreshNow {
        reply: oneshot::Sender<Result<DisplayFrame, RenderError>>,
    },
    Pause,
    Resume,
}

/// Configures and spawns a refresh task.
pub struct RefreshTask<S, D> {
    session_id: SessionId,
    store: Arc<S>,
    surface: Arc<D>,
    renderer: CodeRenderer,
    config: RefreshConfig,
}

impl<S: SessionStore, D: RenderSurface> RefreshTask<S, D> {
    pub fn new(session_id: SessionId, store: Arc<S>, surface: Arc<D>) -> Self {
        Self {
            session_id,
            store,
            surface,
            renderer: CodeRenderer::default(),
            config: RefreshConfig::default(),
        }
    }

    pub fn with_renderer(mut self, renderer: CodeRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_config(mut self, config: RefreshConfig) -> Self {
        self.config = config;
        self
    }

    /// Starts the task. The first draw happens right away; later ones
    /// follow the configured interval.
    pub fn spawn(self) -> RefreshHandle {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let cancel = CancellationToken::new();
        let session_id = self.session_id;

        let actor = RefreshActor {
            session_id,
            store: self.store,
            surface: self.surface,
            renderer: self.renderer,
            scheduler: RefreshScheduler::new(self.config),
            last: None,
            receiver: rx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(actor.run());

        RefreshHandle {
            session_id,
            sender: tx,
            cancel,
            task: Some(task),
        }
    }
}

/// Owner of a running refresh task.
///
/// Dropping the handle cancels the task; [`stop`](Self::stop) also waits
/// for it to exit.
pub struct RefreshHandle {
    session_id: SessionId,
    sender: mpsc::Sender<RefreshCommand>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Redraws immediately and returns the frame now on the surface.
    ///
    /// The periodic schedule restarts from this point.
    pub async fn refresh_now(&self) -> Result<DisplayFrame, RenderError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RefreshCommand::RefreshNow { reply: reply_tx })
            .await
            .map_err(|_| RenderError::Unavailable(self.session_id))?;
        reply_rx
            .await
            .map_err(|_| RenderError::Unavailable(self.session_id))?
    }

    /// Suspends periodic redraws. `refresh_now` still works.
    pub async fn pause(&self) -> Result<(), RenderError> {
        self.send(RefreshCommand::Pause).await
    }

    pub async fn resume(&self) -> Result<(), RenderError> {
        self.send(RefreshCommand::Resume).await
    }

    /// Signals the task to stop without waiting.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops the task and waits until it has exited.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(session_id = %self.session_id, error = %e, "refresh task panicked");
            }
        }
    }

    async fn send(&self, cmd: RefreshCommand) -> Result<(), RenderError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RenderError::Unavailable(self.session_id))
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct RefreshActor<S, D> {
    session_id: SessionId,
    store: Arc<S>,
    surface: Arc<D>,
    renderer: CodeRenderer,
    scheduler: RefreshScheduler,
    /// Last frame handed to the surface.
    last: Option<DisplayFrame>,
    receiver: mpsc::Receiver<RefreshCommand>,
    cancel: CancellationToken,
}

impl<S: SessionStore, D: RenderSurface> RefreshActor<S, D> {
    async fn run(mut self) {
        tracing::info!(session_id = %self.session_id, "refresh task started");

        if let Err(e) = self.redraw(true).await {
            tracing::warn!(session_id = %self.session_id, error = %e, "initial draw failed");
        }

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                cmd = self.receiver.recv() => match cmd {
                    Some(RefreshCommand::RefreshNow { reply }) => {
                        let result = self.redraw(true).await;
                        self.scheduler.reset();
                        let _ = reply.send(result);
                    }
                    Some(RefreshCommand::Pause) => self.scheduler.pause(),
                    Some(RefreshCommand::Resume) => self.scheduler.resume(),
                    None => break,
                },

                info = self.scheduler.wait_for_refresh() => {
                    if let Err(e) = self.redraw(false).await {
                        tracing::warn!(
                            session_id = %self.session_id,
                            refresh = info.refresh,
                            error = %e,
                            "periodic redraw failed, keeping last frame"
                        );
                    }
                    self.scheduler.record_refresh_end();
                }
            }
        }

        tracing::info!(
            session_id = %self.session_id,
            refreshes = self.scheduler.metrics().total_refreshes,
            "refresh task stopped"
        );
    }

    /// Re-reads the session and draws if the content changed, or always
    /// when `force` is set. Returns the frame now on the surface.
    async fn redraw(&mut self, force: bool) -> Result<DisplayFrame, RenderError> {
        let session = self
            .store
            .get_by_id(self.session_id)
            .await?
            .ok_or(RenderError::SessionNotFound(self.session_id))?;
        let mut frame = self.renderer.render(&session)?;

        match &self.last {
            Some(last) if last.same_content(&frame) => {
                if !force {
                    tracing::trace!(session_id = %self.session_id, "display unchanged");
                    return Ok(last.clone());
                }
                frame.revision = last.revision;
            }
            Some(last) => frame.revision = last.revision + 1,
            None => frame.revision = 1,
        }

        self.surface.draw(&frame).await?;
        tracing::debug!(
            session_id = %self.session_id,
            revision = frame.revision,
            status = ?frame.status,
            "display redrawn"
        );
        self.last = Some(frame.clone());
        Ok(frame)
    }
}
