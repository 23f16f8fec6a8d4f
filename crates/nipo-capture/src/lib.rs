//! Camera capture and code detection for Nipo.
//!
//! A student's device points its camera at the classroom display; this
//! crate turns that into a single decoded string, or a reason it could not.
//!
//! # State machine
//!
//! ```text
//!  Idle ──start──→ RequestingDevice ──opened──→ Streaming ⇄ Decoding
//!                        │                                     │ hit
//!                        ▼                                     ▼
//!                  DeviceError(..)                         Detected ──→ Stopped
//! ```
//!
//! Cancellation from any state goes straight to `Stopped`.
//!
//! # Resource rules
//!
//! - At most one camera stream is open per [`CaptureLoop::start`].
//! - The stream is owned by a [`CameraLease`]; dropping the lease releases
//!   the device synchronously.
//! - [`CaptureHandle::cancel`], [`CaptureCanceller::cancel`] and dropping the
//!   handle release the device before they return, whatever the task is
//!   doing at the time. A device acquired while `open` is still pending is
//!   covered once the camera registers it with the [`Acquisition`] it was
//!   given.
//! - Decoding runs on the blocking pool, one attempt per frame.
//!
//! Device access goes through the [`CameraDevice`] / [`FrameSource`] seam.
//! [`MockCamera`] and [`MockDecoder`] stand in for hardware in tests and
//! demos; [`QrDecoder`] is the real decoder.

#![allow(async_fn_in_trait)]

mod capture;
mod decoder;
mod device;
mod error;
mod frame;
mod lease;
mod mock;

pub use capture::{
    CaptureCanceller, CaptureHandle, CaptureLoop, CaptureOutcome, CaptureReport, ScanState,
};
pub use decoder::{FrameDecoder, QrDecoder};
pub use device::{CameraDevice, CameraRequest, DeviceInfo, Facing, FrameSource};
pub use error::DeviceError;
pub use frame::Frame;
pub use lease::{Acquisition, CameraLease, CameraSlot, ReleaseHook};
pub use mock::{MockCamera, MockDecoder, MockStream};
