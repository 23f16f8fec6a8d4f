//! Top-level configuration.

use std::sync::Arc;

use nipo_attendance::{Clock, SystemClock};
use nipo_capture::CameraRequest;
use nipo_protocol::{ProtocolError, TokenFormat};
use nipo_render::RenderConfig;
use nipo_tick::RefreshConfig;
use serde::{Deserialize, Serialize};

use crate::NipoError;

/// Everything a deployment can tune.
///
/// Every field has a default, so a JSON file only needs the keys it
/// changes:
///
/// ```rust
/// let config = nipo::NipoConfig::from_json(r#"{ "refresh": { "interval_ms": 10000 } }"#).unwrap();
/// assert_eq!(config.refresh.interval_ms, 10_000);
/// assert_eq!(config.token.prefix, "NIPO");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NipoConfig {
    pub token: TokenFormat,
    pub refresh: RefreshConfig,
    pub render: RenderConfig,
    pub camera: CameraRequest,
    /// Where projector screens connect.
    pub display_bind: String,
    /// Offset from UTC, in minutes, that decides which calendar day is
    /// "today" for session dates.
    pub utc_offset_minutes: i32,
}

impl Default for NipoConfig {
    fn default() -> Self {
        Self {
            token: TokenFormat::default(),
            refresh: RefreshConfig::default(),
            render: RenderConfig::default(),
            camera: CameraRequest::default(),
            display_bind: "127.0.0.1:9420".into(),
            utc_offset_minutes: 0,
        }
    }
}

impl NipoConfig {
    /// Parses and validates a JSON document.
    pub fn from_json(json: &str) -> Result<Self, NipoError> {
        let config: Self = serde_json::from_str(json).map_err(ProtocolError::Decode)?;
        config.validated()
    }

    /// Rejects values that cannot work and clamps the rest.
    ///
    /// # Errors
    /// - [`NipoError::Protocol`] if the token literals are unusable
    /// - [`NipoError::Config`] if the UTC offset is a day or more, or the
    ///   bind address is empty
    pub fn validated(mut self) -> Result<Self, NipoError> {
        self.token = self.token.validated()?;
        self.refresh = self.refresh.validated();
        if self.display_bind.trim().is_empty() {
            return Err(NipoError::Config("display_bind must not be empty".into()));
        }
        if SystemClock::with_offset_minutes(self.utc_offset_minutes).is_none() {
            return Err(NipoError::Config(format!(
                "utc_offset_minutes must be within a day, got {}",
                self.utc_offset_minutes
            )));
        }
        Ok(self)
    }

    /// Wall clock in the configured offset.
    pub fn clock(&self) -> Result<Arc<dyn Clock>, NipoError> {
        SystemClock::with_offset_minutes(self.utc_offset_minutes)
            .map(|clock| Arc::new(clock) as Arc<dyn Clock>)
            .ok_or_else(|| {
                NipoError::Config(format!(
                    "utc_offset_minutes out of range: {}",
                    self.utc_offset_minutes
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = NipoConfig::default().validated().unwrap();
        assert_eq!(config.token, TokenFormat::default());
        assert_eq!(config.utc_offset_minutes, 0);
    }

    #[test]
    fn test_from_json_empty_object_uses_defaults() {
        let config = NipoConfig::from_json("{}").unwrap();
        assert_eq!(config, NipoConfig::default());
    }

    #[test]
    fn test_from_json_partial_token_keeps_other_literal() {
        let config = NipoConfig::from_json(r#"{ "token": { "kind": "LAB" } }"#).unwrap();
        assert_eq!(config.token.prefix, "NIPO");
        assert_eq!(config.token.kind, "LAB");
    }

    #[test]
    fn test_from_json_clamps_refresh_interval() {
        let config = NipoConfig::from_json(r#"{ "refresh": { "interval_ms": 10 } }"#).unwrap();
        assert_eq!(config.refresh.interval_ms, RefreshConfig::MIN_INTERVAL_MS);
    }

    #[test]
    fn test_from_json_lowercase_prefix_rejected() {
        let err = NipoConfig::from_json(r#"{ "token": { "prefix": "nipo" } }"#).unwrap_err();
        assert!(matches!(err, NipoError::Protocol(ProtocolError::InvalidFormat(_))));
    }

    #[test]
    fn test_from_json_syntax_error_is_decode_error() {
        let err = NipoConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, NipoError::Protocol(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_offset_of_a_day_rejected() {
        let config = NipoConfig {
            utc_offset_minutes: 24 * 60,
            ..NipoConfig::default()
        };
        assert!(matches!(config.validated(), Err(NipoError::Config(_))));
    }

    #[test]
    fn test_clock_uses_offset() {
        let config = NipoConfig {
            utc_offset_minutes: -300,
            ..NipoConfig::default()
        };
        let clock = config.clock().unwrap();
        assert_eq!(clock.offset().local_minus_utc(), -300 * 60);
    }
}
