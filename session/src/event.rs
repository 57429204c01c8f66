use kiosk_types::{Subject, VerificationOutcome};
use serde::Serialize;

use crate::SessionState;

/// Notifications published by the orchestrator for displays and operators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum KioskEvent {
    StateChanged { from: SessionState, to: SessionState },
    /// A scan started a credential check. The token is redacted.
    ScanAccepted { token: String },
    CredentialRejected { reason: String },
    SubjectIdentified { subject: Subject },
    CaptureTaken { bytes: usize },
    CameraFault { reason: String },
    FaceResult { outcome: VerificationOutcome },
    Reset { epoch: u64 },
}
