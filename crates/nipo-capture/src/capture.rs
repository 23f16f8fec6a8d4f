//! The capture loop.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::lease::SlotControl;
use crate::{CameraDevice, CameraRequest, CameraSlot, DeviceError, FrameDecoder, FrameSource};

// ---------------------------------------------------------------------------
// States and results
// ---------------------------------------------------------------------------

/// Where a capture is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanState {
    /// No camera held.
    Idle,
    RequestingDevice,
    /// Camera open, waiting for the next frame.
    Streaming,
    /// A frame is being decoded.
    Decoding,
    /// A payload was decoded and the camera released.
    Detected,
    /// Finished. The camera is released.
    Stopped,
    /// The camera could not be used. Terminal.
    DeviceError(DeviceError),
}

impl ScanState {
    /// `true` while the loop may still hold the camera.
    pub fn holds_camera(&self) -> bool {
        matches!(self, Self::Streaming | Self::Decoding)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::DeviceError(_))
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::RequestingDevice => f.write_str("requesting_device"),
            Self::Streaming => f.write_str("streaming"),
            Self::Decoding => f.write_str("decoding"),
            Self::Detected => f.write_str("detected"),
            Self::Stopped => f.write_str("stopped"),
            Self::DeviceError(e) => write!(f, "device_error({e})"),
        }
    }
}

/// How a capture ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The first payload decoded.
    Detected(String),
    Cancelled,
    Failed(DeviceError),
}

impl CaptureOutcome {
    /// Short label for logs. Never includes the payload.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Detected(_) => "detected",
            Self::Cancelled => "cancelled",
            Self::Failed(e) => e.reason(),
        }
    }
}

/// Summary of one capture, available once it has ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    pub outcome: CaptureOutcome,
    /// Every state the loop entered, in order of first visit.
    pub trail: Vec<ScanState>,
    /// Frames received from the camera.
    pub frames: u64,
    /// Frames decoded without finding a code.
    pub misses: u64,
}

impl CaptureReport {
    fn aborted() -> Self {
        Self {
            outcome: CaptureOutcome::Cancelled,
            trail: vec![ScanState::Stopped],
            frames: 0,
            misses: 0,
        }
    }

    pub fn visited(&self, state: ScanState) -> bool {
        self.trail.contains(&state)
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cancels a capture from anywhere, without knowing its camera type.
///
/// Cheap to clone. `cancel` releases the camera before it returns.
#[derive(Clone)]
pub struct CaptureCanceller {
    slot: Arc<dyn SlotControl>,
    token: CancellationToken,
}

impl CaptureCanceller {
    pub fn cancel(&self) {
        if self.slot.close() {
            tracing::debug!("camera released by cancel");
        }
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl fmt::Debug for CaptureCanceller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureCanceller")
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// Starts captures against a camera and decoder.
pub struct CaptureLoop<C, D> {
    camera: Arc<C>,
    decoder: Arc<D>,
    request: CameraRequest,
}

impl<C: CameraDevice, D: FrameDecoder> CaptureLoop<C, D> {
    pub fn new(camera: Arc<C>, decoder: Arc<D>, request: CameraRequest) -> Self {
        Self {
            camera,
            decoder,
            request,
        }
    }

    /// Starts a capture with its own cancellation token.
    pub fn start(&self) -> CaptureHandle {
        self.start_with(CancellationToken::new())
    }

    /// Starts a capture that also stops when `token` is cancelled.
    ///
    /// Pass a child of a wider scope's token to tie the capture to it.
    /// Cancelling `token` stops the loop promptly, but only
    /// [`CaptureHandle::cancel`] and [`CaptureCanceller::cancel`] guarantee
    /// the camera is free when they return.
    pub fn start_with(&self, token: CancellationToken) -> CaptureHandle {
        let slot = Arc::new(CameraSlot::<C::Stream>::new());
        let (state_tx, state_rx) = watch::channel(ScanState::Idle);

        let run = CaptureRun {
            camera: Arc::clone(&self.camera),
            decoder: Arc::clone(&self.decoder),
            request: self.request.clone(),
            slot: Arc::clone(&slot),
            token: token.clone(),
            tracker: Tracker::new(state_tx),
        };
        let task = tokio::spawn(run.run());

        CaptureHandle {
            state: state_rx,
            canceller: CaptureCanceller { slot, token },
            task: Some(task),
        }
    }
}

/// A running capture.
///
/// Dropping the handle cancels the capture and releases the camera.
pub struct CaptureHandle {
    state: watch::Receiver<ScanState>,
    canceller: CaptureCanceller,
    task: Option<JoinHandle<CaptureReport>>,
}

impl CaptureHandle {
    pub fn state(&self) -> ScanState {
        *self.state.borrow()
    }

    /// A receiver that sees every state change.
    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state.clone()
    }

    pub fn canceller(&self) -> CaptureCanceller {
        self.canceller.clone()
    }

    /// Stops the capture. The camera is released before this returns,
    /// including one still opening if its [`CameraDevice`] registered the
    /// device with its [`Acquisition`](crate::Acquisition).
    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    /// Waits for the capture to end.
    ///
    /// Dropping this future before it resolves cancels the capture.
    pub async fn finish(mut self) -> CaptureReport {
        let Some(task) = self.task.as_mut() else {
            return CaptureReport::aborted();
        };
        let joined = task.await;
        self.task = None;
        match joined {
            Ok(report) => report,
            Err(e) => {
                // Unwinding dropped the lease; closing the slot covers a
                // panic that happened before the lease existed.
                self.canceller.cancel();
                tracing::warn!(error = %e, "capture task failed");
                CaptureReport::aborted()
            }
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        if self.task.as_ref().is_some_and(|t| !t.is_finished()) {
            self.canceller.cancel();
        }
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// Publishes state changes and remembers first visits.
struct Tracker {
    tx: watch::Sender<ScanState>,
    trail: Vec<ScanState>,
}

impl Tracker {
    fn new(tx: watch::Sender<ScanState>) -> Self {
        Self {
            tx,
            trail: vec![ScanState::Idle],
        }
    }

    fn enter(&mut self, state: ScanState) {
        if !self.trail.contains(&state) {
            tracing::debug!(%state, "capture state");
            self.trail.push(state);
        }
        self.tx.send_replace(state);
    }
}

struct CaptureRun<C: CameraDevice, D> {
    camera: Arc<C>,
    decoder: Arc<D>,
    request: CameraRequest,
    slot: Arc<CameraSlot<C::Stream>>,
    token: CancellationToken,
    tracker: Tracker,
}

impl<C: CameraDevice, D: FrameDecoder> CaptureRun<C, D> {
    async fn run(mut self) -> CaptureReport {
        let mut frames = 0u64;
        let mut misses = 0u64;
        let outcome = self.drive(&mut frames, &mut misses).await;

        match &outcome {
            CaptureOutcome::Failed(e) => self.tracker.enter(ScanState::DeviceError(*e)),
            _ => self.tracker.enter(ScanState::Stopped),
        }
        tracing::info!(outcome = outcome.kind(), frames, misses, "capture ended");

        CaptureReport {
            outcome,
            trail: self.tracker.trail,
            frames,
            misses,
        }
    }

    async fn drive(&mut self, frames: &mut u64, misses: &mut u64) -> CaptureOutcome {
        self.tracker.enter(ScanState::RequestingDevice);

        let devices = tokio::select! {
            biased;
            _ = self.token.cancelled() => return CaptureOutcome::Cancelled,
            devices = self.camera.devices() => devices,
        };
        let devices = match devices {
            Ok(devices) => devices,
            Err(e) => return self.fail(e),
        };
        let Some(device) = self.request.pick(&devices).cloned() else {
            return self.fail(DeviceError::NotFound);
        };

        let acquisition = self.slot.acquisition();
        let opened = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            opened = self.camera.open(&device, &self.request, acquisition) => Some(opened),
        };
        let stream = match opened {
            Some(Ok(stream)) => stream,
            Some(Err(e)) => {
                self.slot.abandon_open();
                return self.fail(e);
            }
            None => {
                self.slot.abandon_open();
                return CaptureOutcome::Cancelled;
            }
        };
        let Some(lease) = self.slot.install(stream) else {
            return CaptureOutcome::Cancelled;
        };
        tracing::info!(device = %device.id, facing = ?device.facing, "camera streaming");

        loop {
            self.tracker.enter(ScanState::Streaming);

            let next = tokio::select! {
                biased;
                _ = self.token.cancelled() => None,
                frame = lease.stream().next_frame() => frame,
            };
            let Some(frame) = next else {
                if self.token.is_cancelled() || self.slot.is_closed() {
                    return CaptureOutcome::Cancelled;
                }
                drop(lease);
                tracing::warn!(device = %device.id, "camera stream ended");
                return CaptureOutcome::Failed(DeviceError::NotFound);
            };
            *frames += 1;

            self.tracker.enter(ScanState::Decoding);
            let decoder = Arc::clone(&self.decoder);
            let sequence = frame.sequence();
            let attempt = tokio::task::spawn_blocking(move || decoder.decode(&frame));
            let decoded = tokio::select! {
                biased;
                _ = self.token.cancelled() => return CaptureOutcome::Cancelled,
                decoded = attempt => decoded,
            };

            match decoded {
                Ok(Some(payload)) => {
                    lease.release();
                    self.tracker.enter(ScanState::Detected);
                    tracing::debug!(frame = sequence, len = payload.len(), "code detected");
                    return CaptureOutcome::Detected(payload);
                }
                Ok(None) => {
                    *misses += 1;
                    tracing::trace!(frame = sequence, "no code in frame");
                }
                Err(e) => {
                    *misses += 1;
                    tracing::warn!(frame = sequence, error = %e, "decode task failed");
                }
            }
        }
    }

    fn fail(&self, error: DeviceError) -> CaptureOutcome {
        tracing::warn!(reason = error.reason(), "camera unavailable");
        CaptureOutcome::Failed(error)
    }
}
