//! # Nipo
//!
//! QR-code classroom attendance.
//!
//! An instructor opens a session on a [`ClassroomDisplay`]: a token is
//! issued and drawn as a QR code, refreshed on a timer and pushed to every
//! projector screen through the [`DisplayHub`](nipo_transport::DisplayHub).
//! A student runs a [`ScanSession`]: the camera streams until a code
//! decodes, the code is validated against the stored session, attendance is
//! recorded at most once, and the [`ResultPresenter`] turns the outcome into
//! something to show.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nipo::prelude::*;
//!
//! // let config = NipoConfig::from_json(&std::fs::read_to_string("nipo.json")?)?;
//! // nipo::telemetry::init();
//! // let mut scan = ScanSession::from_config(student, &config, camera, decoder, store, unlock)?;
//! // let view = ResultPresenter::new().present(&scan.scan().await);
//! ```

mod config;
mod display;
mod error;
mod presenter;
mod scan;
pub mod telemetry;

pub use config::NipoConfig;
pub use display::{ClassroomDisplay, WsDisplaySurface};
pub use error::NipoError;
pub use presenter::{Action, Presentation, ResultPresenter, Tone};
pub use scan::{FailureReason, ScanCanceller, ScanResult, ScanSession};

pub mod prelude {
    pub use crate::{
        Action, ClassroomDisplay, FailureReason, NipoConfig, NipoError, Presentation,
        ResultPresenter, ScanCanceller, ScanResult, ScanSession, Tone, WsDisplaySurface,
    };
    pub use nipo_attendance::{
        AttendanceRecorder, Clock, CodeValidator, RecordOutcome, RecordReceipt, SystemClock,
        TokenIssuer, ValidationError, Verdict,
    };
    pub use nipo_capture::{
        CameraDevice, CameraRequest, CaptureLoop, DeviceError, Facing, FrameDecoder,
        FrameSource, QrDecoder, ScanState,
    };
    pub use nipo_protocol::{
        DisplayFrame, DisplayStatus, Session, SessionId, StudentId, TokenFormat,
    };
    pub use nipo_render::{CodeRenderer, RenderConfig, RenderSurface};
    pub use nipo_store::{ContentUnlock, MaterialCatalog, MemoryStore, SessionStore};
    pub use nipo_tick::RefreshConfig;
    pub use nipo_transport::DisplayHub;
}
