//! Session → display frame.

use chrono::Utc;
use nipo_protocol::{DisplayFrame, DisplayStatus, Session};
use qrcode::render::unicode::Dense1x2;
use qrcode::{Color, EcLevel, QrCode};
use serde::{Deserialize, Serialize};

use crate::RenderError;

/// QR error-correction level. Higher levels survive more glare and
/// distance at the cost of a denser code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCorrection {
    Low,
    #[default]
    Medium,
    Quartile,
    High,
}

impl From<ErrorCorrection> for EcLevel {
    fn from(level: ErrorCorrection) -> Self {
        match level {
            ErrorCorrection::Low => EcLevel::L,
            ErrorCorrection::Medium => EcLevel::M,
            ErrorCorrection::Quartile => EcLevel::Q,
            ErrorCorrection::High => EcLevel::H,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub error_correction: ErrorCorrection,
    /// Draw the four-module white border scanners expect.
    pub quiet_zone: bool,
    /// Shown instead of a code when the session is switched off.
    pub inactive_message: String,
    /// Shown when no token has been issued yet.
    pub not_issued_message: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            error_correction: ErrorCorrection::default(),
            quiet_zone: true,
            inactive_message: "Attendance is closed for this session".into(),
            not_issued_message: "No attendance code issued yet".into(),
        }
    }
}

/// The module grid of an encoded token, without a quiet zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeMatrix {
    width: usize,
    dark: Vec<bool>,
}

impl CodeMatrix {
    /// Modules per side.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.dark[y * self.width + x]
    }

    /// Rasterizes the code as 8-bit luma, `scale` pixels per module and a
    /// white border of `margin` modules. Returns the side length in pixels
    /// and the row-major pixels.
    pub fn to_luma(&self, scale: usize, margin: usize) -> (usize, Vec<u8>) {
        let scale = scale.max(1);
        let side = (self.width + 2 * margin) * scale;
        let mut pixels = vec![u8::MAX; side * side];

        for y in 0..self.width {
            for x in 0..self.width {
                if !self.is_dark(x, y) {
                    continue;
                }
                let (px, py) = ((x + margin) * scale, (y + margin) * scale);
                for row in py..py + scale {
                    pixels[row * side + px..row * side + px + scale].fill(0);
                }
            }
        }
        (side, pixels)
    }
}

/// Renders sessions for display.
#[derive(Debug, Clone, Default)]
pub struct CodeRenderer {
    config: RenderConfig,
}

impl CodeRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Encodes a token into a module grid.
    pub fn matrix(&self, token: &str) -> Result<CodeMatrix, RenderError> {
        let code = self.encode(token)?;
        let dark = code.to_colors().into_iter().map(|c| c == Color::Dark).collect();
        Ok(CodeMatrix {
            width: code.width(),
            dark,
        })
    }

    /// Builds the frame a surface should show for `session`.
    ///
    /// Only an active session with a stored token gets a code. The returned
    /// frame has revision 0; the refresh task numbers what it draws.
    pub fn render(&self, session: &Session) -> Result<DisplayFrame, RenderError> {
        let (status, code_rows, fallback) = match (&session.token, session.active) {
            (Some(token), true) => {
                let rows = self.rows(token)?;
                (DisplayStatus::Showing, rows, token.clone())
            }
            (Some(_), false) => (
                DisplayStatus::Inactive,
                Vec::new(),
                self.config.inactive_message.clone(),
            ),
            (None, _) => (
                DisplayStatus::NotIssued,
                Vec::new(),
                self.config.not_issued_message.clone(),
            ),
        };

        Ok(DisplayFrame {
            session_id: session.id,
            sequence: session.sequence,
            title: session.title.clone(),
            scheduled_on: session.scheduled_on,
            status,
            code_rows,
            fallback,
            revision: 0,
            rendered_at: Utc::now(),
        })
    }

    fn rows(&self, token: &str) -> Result<Vec<String>, RenderError> {
        let text = self
            .encode(token)?
            .render::<Dense1x2>()
            .quiet_zone(self.config.quiet_zone)
            .build();
        Ok(text.lines().map(str::to_string).collect())
    }

    fn encode(&self, token: &str) -> Result<QrCode, RenderError> {
        let code =
            QrCode::with_error_correction_level(token, self.config.error_correction.into())?;
        Ok(code)
    }
}
