//! Attendance verification core for Nipo.
//!
//! Three services, each generic over the store traits from `nipo-store`:
//!
//! - [`TokenIssuer`]: writes a fresh token onto a session, or switches it
//!   off
//! - [`CodeValidator`]: checks a decoded string against the stored session,
//!   in a fixed order, returning a [`Verdict`]
//! - [`AttendanceRecorder`]: inserts the attendance row at most once and
//!   unlocks materials
//!
//! Expected outcomes (a bad code, a repeat scan) are values. Only store
//! faults travel as `Err`.
//!
//! ```text
//! TokenIssuer ──writes──→ SessionStore ←──reads── CodeValidator
//!                              ↑                        │ Verdict::Accepted
//!                              └──inserts── AttendanceRecorder
//! ```

mod clock;
mod error;
mod issuer;
mod recorder;
mod validator;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{IssueError, RecordingError, ValidationError};
pub use issuer::TokenIssuer;
pub use recorder::{AttendanceRecorder, RecordOutcome, RecordReceipt};
pub use validator::{CodeValidator, Verdict};
