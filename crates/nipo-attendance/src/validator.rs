//! Decoded-string validation.
//!
//! # Check order
//!
//! ```text
//! raw ─trim─→ parse ──✗──→ Malformed          (no store access)
//!               │
//!               ▼
//!        get_by_sequence ──none──→ UnknownSession
//!               │
//!               ▼
//!        token == stored? ──no──→ ExpiredOrInvalid
//!               │
//!               ▼
//!            active? ──no──→ Inactive
//!               │
//!               ▼
//!   scheduled_on >= today? ──no──→ PastSession
//!               │
//!               ▼
//!           Accepted(session)
//! ```
//!
//! The first failing check wins. A session closed with `invalidate` keeps
//! its token, so that token reports `Inactive`; a token replaced by a
//! reissue no longer matches and reports `ExpiredOrInvalid`.
//!
//! A string that fails parsing never costs a
//! store round-trip, so a camera pointed at an unrelated QR code cannot
//! generate load.

use std::sync::Arc;

use nipo_protocol::{Session, TokenFormat};
use nipo_store::{SessionStore, StoreError};

use crate::{Clock, ValidationError};

/// Result of validating one decoded string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The code is live for this session.
    Accepted(Session),
    Rejected(ValidationError),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Checks decoded strings against stored session state.
pub struct CodeValidator<S> {
    store: Arc<S>,
    format: TokenFormat,
    clock: Arc<dyn Clock>,
}

impl<S: SessionStore> CodeValidator<S> {
    pub fn new(store: Arc<S>, format: TokenFormat, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            format,
            clock,
        }
    }

    /// Validates a raw decoded string.
    ///
    /// Surrounding whitespace is ignored. Rejections are returned as
    /// [`Verdict::Rejected`]; `Err` means the store could not be read.
    pub async fn validate(&self, raw: &str) -> Result<Verdict, StoreError> {
        let candidate = raw.trim();

        let parsed = match self.format.parse(candidate) {
            Ok(parsed) => parsed,
            Err(_) => return Ok(self.reject(candidate, ValidationError::Malformed)),
        };

        let Some(session) = self.store.get_by_sequence(parsed.sequence).await? else {
            return Ok(self.reject(candidate, ValidationError::UnknownSession));
        };

        if session.token.as_deref() != Some(candidate) {
            return Ok(self.reject(candidate, ValidationError::ExpiredOrInvalid));
        }

        if !session.active {
            return Ok(self.reject(candidate, ValidationError::Inactive));
        }

        let today = self.clock.today();
        if session.scheduled_on < today {
            tracing::debug!(
                session_id = %session.id,
                scheduled_on = %session.scheduled_on,
                %today,
                "session is in the past"
            );
            return Ok(self.reject(candidate, ValidationError::PastSession));
        }

        tracing::debug!(session_id = %session.id, sequence = session.sequence, "code accepted");
        Ok(Verdict::Accepted(session))
    }

    fn reject(&self, candidate: &str, reason: ValidationError) -> Verdict {
        // Only the length is logged: a rejected string may still be a live
        // token for another student's screen.
        tracing::debug!(reason = reason.reason(), len = candidate.len(), "code rejected");
        Verdict::Rejected(reason)
    }
}
