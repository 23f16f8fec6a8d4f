//! The camera seam.
//!
//! Platform camera APIs differ wildly; the capture loop only needs to list
//! devices, open one, pull frames and let go. [`CameraDevice`] and
//! [`FrameSource`] are exactly that much.

use serde::{Deserialize, Serialize};

use crate::{Acquisition, DeviceError, Frame};

/// Which way a camera points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    /// Towards the person holding the device.
    User,
    /// Away from them; the one to point at a projector.
    #[default]
    Environment,
}

/// What the capture loop asks of a camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraRequest {
    /// Preferred direction. Falls back to the first device when none
    /// matches.
    pub facing: Facing,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for CameraRequest {
    fn default() -> Self {
        Self {
            facing: Facing::Environment,
            min_width: 320,
            min_height: 240,
        }
    }
}

impl CameraRequest {
    /// The device to open: the first one facing the requested way, else the
    /// first one listed.
    pub fn pick<'a>(&self, devices: &'a [DeviceInfo]) -> Option<&'a DeviceInfo> {
        devices
            .iter()
            .find(|d| d.facing == Some(self.facing))
            .or_else(|| devices.first())
    }
}

/// A camera as the platform lists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub label: String,
    /// `None` when the platform does not say.
    pub facing: Option<Facing>,
}

/// Access to the device's cameras.
pub trait CameraDevice: Send + Sync + 'static {
    type Stream: FrameSource;

    /// Lists available cameras. May prompt for permission.
    ///
    /// # Errors
    /// [`DeviceError::PermissionDenied`] if access is refused.
    fn devices(&self) -> impl Future<Output = Result<Vec<DeviceInfo>, DeviceError>> + Send;

    /// Opens a camera and starts streaming.
    ///
    /// An implementation that holds the device before the returned future
    /// resolves must register its release through `acquisition` as soon as
    /// it does. A cancel runs that hook synchronously; the future itself is
    /// only dropped later. The hook must be safe to run alongside the
    /// stream's own idempotent `release`.
    fn open(
        &self,
        device: &DeviceInfo,
        request: &CameraRequest,
        acquisition: Acquisition,
    ) -> impl Future<Output = Result<Self::Stream, DeviceError>> + Send;
}

/// An open camera stream.
///
/// # Contract
///
/// - `next_frame` resolves with the next frame at device rate, or `None`
///   once the stream has ended or been released.
/// - `release` is synchronous and idempotent. After it returns the device
///   is free, and any pending or later `next_frame` resolves to `None`.
pub trait FrameSource: Send + Sync + 'static {
    fn next_frame(&self) -> impl Future<Output = Option<Frame>> + Send;

    fn release(&self);
}
