use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where and how to reach the verification backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_credential_path")]
    pub credential_path: String,
    #[serde(default = "default_face_path")]
    pub face_path: String,
    #[serde(default = "default_combined_path")]
    pub combined_path: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            credential_path: default_credential_path(),
            face_path: default_face_path(),
            combined_path: default_combined_path(),
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl VerifierConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

// ── Serde default helpers ───────────────────────────────────────────────

fn default_base_url() -> String {
    "http://localhost:5000".to_owned()
}

fn default_credential_path() -> String {
    "/api/employees/verify/qr".to_owned()
}

fn default_face_path() -> String {
    "/api/employees/verify/face".to_owned()
}

fn default_combined_path() -> String {
    "/api/employees/verify".to_owned()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}
