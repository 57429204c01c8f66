//! Daemon configuration file.
//!
//! Every field has a default, so an empty file (or none at all) yields a
//! working kiosk pointed at a backend on `localhost:5000`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use kiosk_session::SessionConfig;
use kiosk_utils::LogFormat;
use kiosk_verifier::VerifierConfig;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KioskConfig {
    #[serde(default)]
    pub verifier: VerifierConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub status: StatusConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// `/dev/video{device}` when built with V4L2 support.
    #[serde(default)]
    pub device: usize,
    /// Serve this picture instead of opening a device.
    #[serde(default)]
    pub still_image: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Operator status API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_status_bind")]
    pub bind: String,
    #[serde(default = "default_status_port")]
    pub port: u16,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: default_status_bind(),
            port: default_status_port(),
        }
    }
}

impl KioskConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

// ── Serde default helpers ───────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_status_bind() -> String {
    "127.0.0.1".to_owned()
}

fn default_status_port() -> u16 {
    7080
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        let config = KioskConfig::from_toml_str("").unwrap();
        assert_eq!(config, KioskConfig::default());
        assert_eq!(config.verifier.base_url, "http://localhost:5000");
        assert!(config.session.block_on_face_result);
        assert!(!config.status.enabled);
    }

    #[test]
    fn sections_override_independently() {
        let config = KioskConfig::from_toml_str(
            r#"
            [verifier]
            base_url = "http://backend.lan:5000"

            [session]
            block_on_face_result = false
            reset_delay_ms = 3000

            [camera]
            still_image = "/srv/kiosk/badge.png"

            [logging]
            format = "json"

            [status]
            enabled = true
            port = 9000
            "#,
        )
        .unwrap();
        assert_eq!(config.verifier.base_url, "http://backend.lan:5000");
        assert_eq!(config.verifier.credential_path, "/api/employees/verify/qr");
        assert!(!config.session.block_on_face_result);
        assert_eq!(config.session.reset_delay_ms, 3000);
        assert_eq!(config.session.cooldown_ms, 2000);
        assert_eq!(
            config.camera.still_image.as_deref(),
            Some(Path::new("/srv/kiosk/badge.png"))
        );
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.status.port, 9000);
        assert_eq!(config.status.bind, "127.0.0.1");
    }

    #[test]
    fn unknown_flow_is_rejected() {
        let err = KioskConfig::from_toml_str("[session]\nflow = \"triple\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn load_reports_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[status]\nport = \"not a number\"").unwrap();
        let err = KioskConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains(&file.path().display().to_string()));

        let missing = KioskConfig::load(Path::new("/nonexistent/kiosk.toml")).unwrap_err();
        assert!(missing.to_string().contains("failed to read"));
    }
}
