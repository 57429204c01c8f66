//! Decoded code presentations.

use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// Number of leading characters of a credential token that may appear in logs.
const REDACTED_PREFIX_LEN: usize = 4;

/// A single deduplicated decode of a presented code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    /// The decoded payload, used verbatim as the credential token.
    pub raw_value: String,
    pub timestamp: Timestamp,
}

impl ScanEvent {
    pub fn new(raw_value: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            raw_value: raw_value.into(),
            timestamp,
        }
    }

    /// Token prefix safe to write to logs.
    pub fn redacted(&self) -> String {
        redact_token(&self.raw_value)
    }
}

/// Shorten a credential token so it can be logged without leaking it.
pub fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(REDACTED_PREFIX_LEN).collect();
    if token.chars().count() > REDACTED_PREFIX_LEN {
        format!("{prefix}…")
    } else {
        prefix
    }
}
