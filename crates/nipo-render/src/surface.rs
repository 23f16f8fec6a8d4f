//! Where frames go.

use std::sync::{Mutex, PoisonError};

use nipo_protocol::DisplayFrame;
use tokio::sync::watch;

use crate::RenderError;

/// Something that can show a [`DisplayFrame`]: a projector window, a
/// terminal, or a hub that forwards frames to remote screens.
pub trait RenderSurface: Send + Sync + 'static {
    fn draw(&self, frame: &DisplayFrame) -> impl Future<Output = Result<(), RenderError>> + Send;
}

/// Keeps every drawn frame in memory.
pub struct MemorySurface {
    frames: Mutex<Vec<DisplayFrame>>,
    drawn: watch::Sender<usize>,
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            drawn: watch::Sender::new(0),
        }
    }
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<DisplayFrame> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last(&self) -> Option<DisplayFrame> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn draw_count(&self) -> usize {
        *self.drawn.borrow()
    }

    /// Resolves once at least `count` frames have been drawn.
    pub async fn wait_for_draws(&self, count: usize) {
        let mut rx = self.drawn.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|drawn| *drawn >= count).await;
    }
}

impl RenderSurface for MemorySurface {
    async fn draw(&self, frame: &DisplayFrame) -> Result<(), RenderError> {
        let count = {
            let mut frames = self.frames.lock().unwrap_or_else(PoisonError::into_inner);
            frames.push(frame.clone());
            frames.len()
        };
        self.drawn.send_replace(count);
        Ok(())
    }
}
