//! In-process camera and decoder for tests and demos.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{
    Acquisition, CameraDevice, CameraRequest, DeviceError, DeviceInfo, Facing, Frame, FrameDecoder,
    FrameSource,
};

const BLANK_WIDTH: u32 = 64;
const BLANK_HEIGHT: u32 = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behavior {
    Ready,
    Deny,
    Unsupported,
}

/// A scripted camera.
///
/// Lists a rear and a front camera, serves the scripted frames at a fixed
/// interval, then blank frames forever (or ends the stream, to simulate an
/// unplugged device). Counts open streams so tests can prove the device was
/// released. An open delay keeps the device claimed while `open` is still
/// pending, the way a slow platform prompt or sensor warm-up does.
pub struct MockCamera {
    behavior: Behavior,
    devices: Vec<DeviceInfo>,
    script: Arc<Vec<Frame>>,
    frame_interval: Duration,
    open_delay: Duration,
    end_after_script: bool,
    open_streams: Arc<AtomicUsize>,
    opened: AtomicUsize,
    last_opened: Mutex<Option<String>>,
}

impl Default for MockCamera {
    fn default() -> Self {
        Self {
            behavior: Behavior::Ready,
            devices: vec![
                DeviceInfo {
                    id: "mock-rear".into(),
                    label: "Mock rear camera".into(),
                    facing: Some(Facing::Environment),
                },
                DeviceInfo {
                    id: "mock-front".into(),
                    label: "Mock front camera".into(),
                    facing: Some(Facing::User),
                },
            ],
            script: Arc::new(Vec::new()),
            frame_interval: Duration::from_millis(5),
            open_delay: Duration::ZERO,
            end_after_script: false,
            open_streams: Arc::new(AtomicUsize::new(0)),
            opened: AtomicUsize::new(0),
            last_opened: Mutex::new(None),
        }
    }
}

impl MockCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every permission prompt is refused.
    pub fn denying(mut self) -> Self {
        self.behavior = Behavior::Deny;
        self
    }

    /// Lists no cameras.
    pub fn without_devices(mut self) -> Self {
        self.devices.clear();
        self
    }

    /// Lists cameras that refuse to open.
    pub fn unsupported(mut self) -> Self {
        self.behavior = Behavior::Unsupported;
        self
    }

    /// Frames served, in order, by every stream opened after this call.
    pub fn with_frames(mut self, frames: Vec<Frame>) -> Self {
        self.script = Arc::new(frames);
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Holds the device for `delay` before `open` resolves.
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Ends the stream after the scripted frames instead of going blank.
    pub fn ending_after_script(mut self) -> Self {
        self.end_after_script = true;
        self
    }

    /// Streams opened and not yet released.
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    /// Streams opened over the camera's lifetime.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Id of the most recently opened device.
    pub fn last_opened(&self) -> Option<String> {
        self.last_opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CameraDevice for MockCamera {
    type Stream = MockStream;

    async fn devices(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        match self.behavior {
            Behavior::Deny => Err(DeviceError::PermissionDenied),
            _ => Ok(self.devices.clone()),
        }
    }

    async fn open(
        &self,
        device: &DeviceInfo,
        _request: &CameraRequest,
        acquisition: Acquisition,
    ) -> Result<MockStream, DeviceError> {
        match self.behavior {
            Behavior::Deny => return Err(DeviceError::PermissionDenied),
            Behavior::Unsupported => return Err(DeviceError::Unsupported),
            Behavior::Ready => {}
        }
        if !self.devices.iter().any(|d| d.id == device.id) {
            return Err(DeviceError::NotFound);
        }

        self.open_streams.fetch_add(1, Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);
        *self.last_opened.lock().unwrap_or_else(PoisonError::into_inner) = Some(device.id.clone());
        tracing::debug!(device = %device.id, "mock camera opened");

        let claim = Arc::new(Claim {
            released: AtomicBool::new(false),
            stop: CancellationToken::new(),
            open_streams: Arc::clone(&self.open_streams),
        });
        let stream = MockStream {
            script: Arc::clone(&self.script),
            cursor: AtomicUsize::new(0),
            interval: self.frame_interval,
            end_after_script: self.end_after_script,
            claim: Arc::clone(&claim),
        };

        if acquisition.hold(move || claim.release()) && !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        Ok(stream)
    }
}

/// The device as held by one open, shared by the stream and its release
/// hook.
struct Claim {
    released: AtomicBool,
    /// Wakes a pending `next_frame` on release.
    stop: CancellationToken,
    open_streams: Arc<AtomicUsize>,
}

impl Claim {
    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.stop.cancel();
            self.open_streams.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!("mock camera released");
        }
    }
}

/// Stream handed out by [`MockCamera`].
pub struct MockStream {
    script: Arc<Vec<Frame>>,
    cursor: AtomicUsize,
    interval: Duration,
    end_after_script: bool,
    claim: Arc<Claim>,
}

impl FrameSource for MockStream {
    async fn next_frame(&self) -> Option<Frame> {
        tokio::select! {
            biased;
            _ = self.claim.stop.cancelled() => return None,
            _ = tokio::time::sleep(self.interval) => {}
        }

        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        let frame = match self.script.get(index) {
            Some(frame) => frame.clone(),
            None if self.end_after_script => return None,
            None => Frame::blank(BLANK_WIDTH, BLANK_HEIGHT),
        };
        Some(frame.with_sequence(index as u64))
    }

    fn release(&self) {
        self.claim.release();
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.release();
    }
}

/// A decoder that "finds" payloads in chosen frames by sequence number.
#[derive(Default)]
pub struct MockDecoder {
    hits: HashMap<u64, String>,
    attempts: AtomicUsize,
}

impl MockDecoder {
    /// Never decodes anything.
    pub fn never() -> Self {
        Self::default()
    }

    /// Decodes `payload` from the frame with this sequence number.
    pub fn hit_on(mut self, sequence: u64, payload: impl Into<String>) -> Self {
        self.hits.insert(sequence, payload.into());
        self
    }

    /// Decode attempts so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl FrameDecoder for MockDecoder {
    fn decode(&self, frame: &Frame) -> Option<String> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.hits.get(&frame.sequence()).cloned()
    }
}
