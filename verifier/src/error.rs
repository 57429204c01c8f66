use serde::Serialize;
use thiserror::Error;

pub const CREDENTIAL_FALLBACK: &str = "Credential verification failed";
pub const FACE_FALLBACK: &str = "Face verification failed";

/// Why a remote check failed. The session treats every cause the same way;
/// the distinction is for logs and metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// The backend answered and said no.
    Rejected,
    /// The backend could not be reached or failed internally.
    Network,
    /// The backend answered with something unreadable.
    Malformed,
}

impl FailureCause {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureCause::Rejected => "rejected",
            FailureCause::Network => "network",
            FailureCause::Malformed => "malformed",
        }
    }
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum VerifierError {
    #[error("credential rejected ({cause}): {reason}")]
    CredentialRejected { reason: String, cause: FailureCause },

    #[error("face verification failed ({cause}): {reason}")]
    FaceVerificationFailed { reason: String, cause: FailureCause },
}

impl VerifierError {
    pub fn credential(cause: FailureCause, reason: Option<String>) -> Self {
        VerifierError::CredentialRejected {
            reason: non_empty(reason).unwrap_or_else(|| CREDENTIAL_FALLBACK.to_owned()),
            cause,
        }
    }

    pub fn face(cause: FailureCause, reason: Option<String>) -> Self {
        VerifierError::FaceVerificationFailed {
            reason: non_empty(reason).unwrap_or_else(|| FACE_FALLBACK.to_owned()),
            cause,
        }
    }

    /// Human-readable reason suitable for display at the kiosk.
    pub fn reason(&self) -> &str {
        match self {
            VerifierError::CredentialRejected { reason, .. }
            | VerifierError::FaceVerificationFailed { reason, .. } => reason,
        }
    }

    pub fn cause(&self) -> FailureCause {
        match self {
            VerifierError::CredentialRejected { cause, .. }
            | VerifierError::FaceVerificationFailed { cause, .. } => *cause,
        }
    }
}

fn non_empty(reason: Option<String>) -> Option<String> {
    reason.filter(|r| !r.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_reason_uses_fallback() {
        let err = VerifierError::credential(FailureCause::Network, None);
        assert_eq!(err.reason(), CREDENTIAL_FALLBACK);
        assert_eq!(err.cause(), FailureCause::Network);

        let err = VerifierError::face(FailureCause::Malformed, Some("  ".into()));
        assert_eq!(err.reason(), FACE_FALLBACK);
    }

    #[test]
    fn backend_reason_is_kept() {
        let err = VerifierError::credential(FailureCause::Rejected, Some("Invalid QR code".into()));
        assert_eq!(err.reason(), "Invalid QR code");
        assert_eq!(
            err.to_string(),
            "credential rejected (rejected): Invalid QR code"
        );
    }
}
