//! The instructor's side: one classroom screen showing one session's code.

use std::sync::Arc;

use nipo_attendance::{Clock, TokenIssuer};
use nipo_protocol::{Codec, DisplayFrame, JsonCodec, SessionId};
use nipo_render::{CodeRenderer, RefreshHandle, RefreshTask, RenderError, RenderSurface};
use nipo_store::SessionStore;
use nipo_tick::RefreshConfig;
use nipo_transport::DisplayHub;

use crate::{NipoConfig, NipoError};

/// Issues tokens and keeps a surface showing the open session.
///
/// ```text
///  open(id) ─→ issue token ─→ refresh task ──every interval──→ surface
///  reissue  ─→ issue token ─→ redraw now
///  close    ─→ invalidate  ─→ redraw now (screen shows "closed")
///  stop     ─→ refresh task ends, token untouched
/// ```
pub struct ClassroomDisplay<S, D> {
    store: Arc<S>,
    surface: Arc<D>,
    issuer: TokenIssuer<S>,
    renderer: CodeRenderer,
    refresh: RefreshConfig,
    handle: Option<RefreshHandle>,
}

impl<S: SessionStore, D: RenderSurface> ClassroomDisplay<S, D> {
    pub fn new(store: Arc<S>, surface: Arc<D>, issuer: TokenIssuer<S>) -> Self {
        Self {
            store,
            surface,
            issuer,
            renderer: CodeRenderer::default(),
            refresh: RefreshConfig::default(),
            handle: None,
        }
    }

    pub fn from_config(
        config: &NipoConfig,
        store: Arc<S>,
        surface: Arc<D>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let issuer = TokenIssuer::new(Arc::clone(&store), config.token.clone(), clock);
        Self::new(store, surface, issuer)
            .with_renderer(CodeRenderer::new(config.render.clone()))
            .with_refresh(config.refresh.clone())
    }

    pub fn with_renderer(mut self, renderer: CodeRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_refresh(mut self, refresh: RefreshConfig) -> Self {
        self.refresh = refresh;
        self
    }

    /// The session on screen, if any.
    pub fn session_id(&self) -> Option<SessionId> {
        self.handle.as_ref().map(RefreshHandle::session_id)
    }

    /// Issues a fresh token for `id` and puts it on screen.
    ///
    /// Opening a different session replaces the one on screen; its token
    /// stays valid until reissued or closed.
    pub async fn open(&mut self, id: SessionId) -> Result<DisplayFrame, NipoError> {
        self.issuer.issue(id).await?;

        if self.session_id().is_some_and(|current| current != id) {
            self.stop().await;
        }
        if self.handle.is_none() {
            let handle = RefreshTask::new(id, Arc::clone(&self.store), Arc::clone(&self.surface))
                .with_renderer(self.renderer.clone())
                .with_config(self.refresh.clone())
                .spawn();
            self.handle = Some(handle);
        }
        tracing::info!(session_id = %id, "session on display");
        self.redraw().await
    }

    /// Replaces the token on screen. Codes scanned from the old one stop
    /// validating.
    pub async fn reissue(&mut self) -> Result<DisplayFrame, NipoError> {
        let id = self.session_id().ok_or(NipoError::DisplayIdle)?;
        self.issuer.issue(id).await?;
        self.redraw().await
    }

    /// Switches attendance off and redraws at once, so the code leaves the
    /// screen without waiting for the next refresh.
    pub async fn close(&mut self) -> Result<DisplayFrame, NipoError> {
        let id = self.session_id().ok_or(NipoError::DisplayIdle)?;
        self.issuer.invalidate(id).await?;
        tracing::info!(session_id = %id, "attendance closed");
        self.redraw().await
    }

    /// Stops refreshing. The stored token is left as it is.
    pub async fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let id = handle.session_id();
            handle.stop().await;
            tracing::debug!(session_id = %id, "display refresh stopped");
        }
    }

    async fn redraw(&self) -> Result<DisplayFrame, NipoError> {
        let handle = self.handle.as_ref().ok_or(NipoError::DisplayIdle)?;
        Ok(handle.refresh_now().await?)
    }
}

/// Sends frames to every projector screen connected to a [`DisplayHub`].
pub struct WsDisplaySurface<C = JsonCodec> {
    hub: Arc<DisplayHub>,
    codec: C,
}

impl WsDisplaySurface {
    pub fn new(hub: Arc<DisplayHub>) -> Self {
        Self::with_codec(hub, JsonCodec)
    }
}

impl<C: Codec> WsDisplaySurface<C> {
    pub fn with_codec(hub: Arc<DisplayHub>, codec: C) -> Self {
        Self { hub, codec }
    }

    pub fn hub(&self) -> &DisplayHub {
        &self.hub
    }
}

impl<C: Codec> RenderSurface for WsDisplaySurface<C> {
    async fn draw(&self, frame: &DisplayFrame) -> Result<(), RenderError> {
        let bytes = self
            .codec
            .encode(frame)
            .map_err(|e| RenderError::Surface(e.to_string()))?;
        self.hub
            .publish(bytes)
            .map_err(|e| RenderError::Surface(e.to_string()))?;
        tracing::trace!(
            session_id = %frame.session_id,
            revision = frame.revision,
            screens = self.hub.subscribers(),
            "frame published"
        );
        Ok(())
    }
}
