//! Session timing and policy.

use std::time::Duration;

use kiosk_types::CameraConstraints;
use serde::{Deserialize, Serialize};

/// How the two proofs are submitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationFlow {
    /// Credential check first, then a face check for the returned subject.
    #[default]
    TwoPhase,
    /// No credential pre-check; token and face go out in a single call.
    Combined,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Foreground variant when `true`: the face result is shown and stays
    /// until dismissed. Background variant when `false`: the face call runs
    /// unobserved and the session resets on a timer regardless of outcome.
    #[serde(default = "default_block_on_face_result")]
    pub block_on_face_result: bool,
    #[serde(default)]
    pub flow: VerificationFlow,
    /// Delay before scanning resumes after a rejected credential.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// Delay between the camera going live and the automatic capture.
    #[serde(default = "default_capture_delay_ms")]
    pub capture_delay_ms: u64,
    /// Background variant: delay from capture to reset. Also used to
    /// self-heal after a camera fault in the background variant.
    #[serde(default = "default_reset_delay_ms")]
    pub reset_delay_ms: u64,
    /// Foreground variant: dismiss the result automatically after this long.
    /// `None` leaves dismissal to the operator.
    #[serde(default)]
    pub result_display_ms: Option<u64>,
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default)]
    pub constraints: CameraConstraints,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            block_on_face_result: default_block_on_face_result(),
            flow: VerificationFlow::default(),
            cooldown_ms: default_cooldown_ms(),
            capture_delay_ms: default_capture_delay_ms(),
            reset_delay_ms: default_reset_delay_ms(),
            result_display_ms: None,
            scan_interval_ms: default_scan_interval_ms(),
            jpeg_quality: default_jpeg_quality(),
            constraints: CameraConstraints::default(),
        }
    }
}

impl SessionConfig {
    /// Background variant with default timings.
    pub fn background() -> Self {
        Self {
            block_on_face_result: false,
            ..Self::default()
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn capture_delay(&self) -> Duration {
        Duration::from_millis(self.capture_delay_ms)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }

    pub fn result_display(&self) -> Option<Duration> {
        self.result_display_ms.map(Duration::from_millis)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms.max(1))
    }
}

// ── Serde default helpers ───────────────────────────────────────────────

fn default_block_on_face_result() -> bool {
    true
}

fn default_cooldown_ms() -> u64 {
    2_000
}

fn default_capture_delay_ms() -> u64 {
    2_000
}

fn default_reset_delay_ms() -> u64 {
    2_000
}

fn default_scan_interval_ms() -> u64 {
    100
}

fn default_jpeg_quality() -> u8 {
    80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_kiosk_timings() {
        let config = SessionConfig::default();
        assert!(config.block_on_face_result);
        assert_eq!(config.flow, VerificationFlow::TwoPhase);
        assert_eq!(config.cooldown(), Duration::from_secs(2));
        assert_eq!(config.capture_delay(), Duration::from_secs(2));
        assert_eq!(config.reset_delay(), Duration::from_secs(2));
        assert_eq!(config.result_display(), None);
        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.constraints.width, 640);
    }

    #[test]
    fn partial_toml_overrides() {
        let config: SessionConfig = toml::from_str(
            r#"
            block_on_face_result = false
            flow = "combined"
            reset_delay_ms = 3000

            [constraints]
            facing = "environment"
            "#,
        )
        .unwrap();
        assert!(!config.block_on_face_result);
        assert_eq!(config.flow, VerificationFlow::Combined);
        assert_eq!(config.reset_delay(), Duration::from_secs(3));
        assert_eq!(config.cooldown_ms, 2_000);
        assert_eq!(config.constraints.height, 480);
    }

    #[test]
    fn zero_scan_interval_is_clamped() {
        let config = SessionConfig {
            scan_interval_ms: 0,
            ..SessionConfig::default()
        };
        assert_eq!(config.scan_interval(), Duration::from_millis(1));
    }
}
