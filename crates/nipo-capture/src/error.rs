//! Device errors.

use serde::{Deserialize, Serialize};

/// Why the camera could not be used. Fatal to the current capture; the
/// device is never held once one of these is reported.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error,
)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceError {
    /// The user or the platform refused camera access.
    #[error("permission-denied")]
    PermissionDenied,

    /// No camera is present, or it disappeared mid-stream.
    #[error("not-found")]
    NotFound,

    /// A camera exists but cannot produce frames we can use.
    #[error("unsupported")]
    Unsupported,
}

impl DeviceError {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission-denied",
            Self::NotFound => "not-found",
            Self::Unsupported => "unsupported",
        }
    }

    /// What the student can do about it.
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::PermissionDenied => {
                "Allow camera access for this app in your device settings, then try again."
            }
            Self::NotFound => "Connect a camera or switch to a device that has one.",
            Self::Unsupported => {
                "This camera cannot be used for scanning. Try another device or type the code shown."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_reason() {
        for err in [
            DeviceError::PermissionDenied,
            DeviceError::NotFound,
            DeviceError::Unsupported,
        ] {
            assert_eq!(err.to_string(), err.reason());
            assert!(!err.remediation().is_empty());
        }
    }

    #[test]
    fn test_serializes_kebab_case() {
        let json = serde_json::to_value(DeviceError::PermissionDenied).unwrap();
        assert_eq!(json, "permission-denied");
    }
}
