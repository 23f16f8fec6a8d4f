//! Token issuing and invalidation.

use std::sync::Arc;

use nipo_protocol::{Session, SessionId, TokenFormat, TokenState};
use nipo_store::{SessionStore, StoreError};

use crate::{Clock, IssueError};

/// Writes session tokens.
///
/// The issuer is the only component that changes token state. Renderers and
/// validators read what it wrote.
pub struct TokenIssuer<S> {
    store: Arc<S>,
    format: TokenFormat,
    clock: Arc<dyn Clock>,
}

impl<S: SessionStore> TokenIssuer<S> {
    pub fn new(store: Arc<S>, format: TokenFormat, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            format,
            clock,
        }
    }

    pub fn format(&self) -> &TokenFormat {
        &self.format
    }

    /// Issues a fresh token and activates the session.
    ///
    /// Overwrites any previous token, which stops validating immediately.
    pub async fn issue(&self, id: SessionId) -> Result<Session, IssueError> {
        let previous = self.load(id).await?;
        let token = self.format.issue(previous.sequence);

        let state = TokenState {
            token: Some(token),
            active: true,
            issued_at: Some(self.clock.now()),
            invalidated_at: None,
        };
        let session = self.write(id, state).await?;

        tracing::info!(
            session_id = %id,
            sequence = session.sequence,
            replaced = replaces_token(&previous),
            "token issued"
        );
        Ok(session)
    }

    /// Switches scanning off for a session.
    ///
    /// The stored token stays in place; a scan of it now fails on the
    /// activation check.
    pub async fn invalidate(&self, id: SessionId) -> Result<Session, IssueError> {
        let session = self.load(id).await?;

        let state = TokenState {
            active: false,
            invalidated_at: Some(self.clock.now()),
            ..session.token_state()
        };
        let session = self.write(id, state).await?;

        tracing::info!(session_id = %id, sequence = session.sequence, "token invalidated");
        Ok(session)
    }

    async fn load(&self, id: SessionId) -> Result<Session, IssueError> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or(IssueError::NotFound(id))
    }

    async fn write(&self, id: SessionId, state: TokenState) -> Result<Session, IssueError> {
        match self.store.update_token_state(id, state).await {
            Ok(session) => Ok(session),
            // Deleted between the read and the write.
            Err(StoreError::NotFound(id)) => Err(IssueError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Whether issuing over `previous` discards a token that was handed out.
fn replaces_token(previous: &Session) -> bool {
    previous.token.is_some()
}
