//! Camera ownership.
//!
//! A [`CameraSlot`] is shared between the capture task and whoever may
//! cancel it. It holds the open stream, if any:
//!
//! ```text
//!            hold                  install               vacate (lease dropped)
//!   Vacant ────────→ Opening(hooks) ───────→ Held(stream) ─────────────────────→ Vacant
//!     │                   │                      │
//!     └───────close───────┴────────close─────────┴──close──→ Closed (device released)
//! ```
//!
//! A camera that holds the device before its `open` resolves registers a
//! release hook through an [`Acquisition`]; `close` runs it, so a cancel in
//! `RequestingDevice` frees the device as surely as one while streaming.
//!
//! `Closed` is permanent: a stream that finishes opening after a cancel is
//! released on the spot instead of being installed. Every transition runs
//! under a plain mutex and releases directly, so the device is free by the
//! time `close` or a lease's `drop` returns.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::FrameSource;

/// Frees a device whose `open` has not resolved yet.
pub type ReleaseHook = Box<dyn FnOnce() + Send>;

enum SlotState<S> {
    Vacant,
    Opening(Vec<ReleaseHook>),
    Held(Arc<S>),
    Closed,
}

/// Holder for at most one open stream.
pub struct CameraSlot<S> {
    state: Mutex<SlotState<S>>,
}

impl<S: FrameSource> Default for CameraSlot<S> {
    fn default() -> Self {
        Self {
            state: Mutex::new(SlotState::Vacant),
        }
    }
}

impl<S: FrameSource> CameraSlot<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registration point for the device about to be opened.
    pub fn acquisition(self: &Arc<Self>) -> Acquisition {
        let slot: Arc<dyn SlotControl> = Arc::clone(self) as Arc<dyn SlotControl>;
        Acquisition { slot }
    }

    /// Takes ownership of a freshly opened stream.
    ///
    /// Pending release hooks are dropped without running: the stream's own
    /// `release` takes over. Returns `None`, with the stream already
    /// released, if the slot was closed while the device was opening.
    ///
    /// # Panics
    /// Debug builds assert the slot is not already holding a stream.
    pub fn install(self: &Arc<Self>, stream: S) -> Option<CameraLease<S>> {
        let stream = Arc::new(stream);
        let mut state = self.lock();
        if matches!(*state, SlotState::Closed) {
            drop(state);
            stream.release();
            tracing::debug!("camera opened after cancel, released immediately");
            return None;
        }

        debug_assert!(
            !matches!(*state, SlotState::Held(_)),
            "slot already holds a stream"
        );
        let pending = std::mem::replace(&mut *state, SlotState::Held(Arc::clone(&stream)));
        drop(state);
        drop(pending);

        Some(CameraLease {
            slot: Arc::clone(self),
            stream,
        })
    }

    /// Releases any held or opening device and refuses future installs.
    ///
    /// Returns `true` if a device was released by this call.
    pub fn close(&self) -> bool {
        let previous = std::mem::replace(&mut *self.lock(), SlotState::Closed);
        match previous {
            SlotState::Held(stream) => {
                stream.release();
                true
            }
            SlotState::Opening(hooks) => {
                let released = !hooks.is_empty();
                hooks.into_iter().for_each(|release| release());
                released
            }
            SlotState::Vacant | SlotState::Closed => false,
        }
    }

    /// Runs the release hooks of an open that will never be installed.
    ///
    /// Called once the opener gave up: the open failed or its future was
    /// dropped. A slot that is not opening is left alone.
    pub fn abandon_open(&self) {
        let mut state = self.lock();
        if matches!(*state, SlotState::Opening(_)) {
            if let SlotState::Opening(hooks) = std::mem::replace(&mut *state, SlotState::Vacant) {
                drop(state);
                hooks.into_iter().for_each(|release| release());
            }
        }
    }

    fn hold(&self, release: ReleaseHook) -> bool {
        let mut state = self.lock();
        if let SlotState::Opening(hooks) = &mut *state {
            hooks.push(release);
            return true;
        }
        if matches!(*state, SlotState::Vacant) {
            *state = SlotState::Opening(vec![release]);
            return true;
        }

        debug_assert!(
            matches!(*state, SlotState::Closed),
            "hold after the stream was installed"
        );
        drop(state);
        release();
        false
    }

    pub fn is_held(&self) -> bool {
        matches!(*self.lock(), SlotState::Held(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.lock(), SlotState::Closed)
    }

    fn vacate(&self) {
        let mut state = self.lock();
        // Closed stays closed; its stream was already released by `close`.
        if matches!(*state, SlotState::Held(_)) {
            if let SlotState::Held(stream) = std::mem::replace(&mut *state, SlotState::Vacant) {
                drop(state);
                stream.release();
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<S>> {
        // A panic elsewhere must not keep the camera locked open.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases the camera when dropped.
pub struct CameraLease<S: FrameSource> {
    slot: Arc<CameraSlot<S>>,
    stream: Arc<S>,
}

impl<S: FrameSource> CameraLease<S> {
    pub fn stream(&self) -> &S {
        &self.stream
    }

    /// Releases the camera now. Same as dropping the lease.
    pub fn release(self) {}
}

impl<S: FrameSource> Drop for CameraLease<S> {
    fn drop(&mut self) {
        self.slot.vacate();
    }
}

/// Handed to [`CameraDevice::open`](crate::CameraDevice::open) so a device
/// acquired mid-open can be released by a cancel.
#[derive(Clone)]
pub struct Acquisition {
    slot: Arc<dyn SlotControl>,
}

impl Acquisition {
    /// Registers `release` to run if the capture is cancelled before the
    /// stream is installed.
    ///
    /// Returns `false` when the capture was already cancelled; `release`
    /// has run by then and the open should be abandoned.
    pub fn hold(&self, release: impl FnOnce() + Send + 'static) -> bool {
        self.slot.hold(Box::new(release))
    }

    pub fn is_cancelled(&self) -> bool {
        self.slot.is_closed()
    }
}

impl std::fmt::Debug for Acquisition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acquisition")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Object-safe view of a slot, for cancellers that do not know the stream
/// type.
pub(crate) trait SlotControl: Send + Sync {
    fn close(&self) -> bool;
    fn hold(&self, release: ReleaseHook) -> bool;
    fn is_closed(&self) -> bool;
}

impl<S: FrameSource> SlotControl for CameraSlot<S> {
    fn close(&self) -> bool {
        CameraSlot::close(self)
    }

    fn hold(&self, release: ReleaseHook) -> bool {
        CameraSlot::hold(self, release)
    }

    fn is_closed(&self) -> bool {
        CameraSlot::is_closed(self)
    }
}
