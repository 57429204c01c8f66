//! Session data and its state machine.

use kiosk_types::{redact_token, CapturedImage, Subject, SubjectId, VerificationOutcome};
use serde::Serialize;

use crate::SessionError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Scanner live; waiting for a code (or for its credential check).
    #[default]
    AwaitingCredential,
    /// Subject known; capture camera live and the automatic capture armed.
    AwaitingFace,
    /// Still captured; face check issued.
    VerifyingFace,
    /// Face result on display until dismissed (foreground variant only).
    Result,
}

impl SessionState {
    /// Forward edges of the cycle. Returning to `AwaitingCredential` only
    /// happens through a reset, which rebuilds the session.
    pub fn can_advance_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::AwaitingCredential, SessionState::AwaitingFace)
                | (SessionState::AwaitingFace, SessionState::VerifyingFace)
                | (SessionState::VerifyingFace, SessionState::Result)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::AwaitingCredential => "awaiting_credential",
            SessionState::AwaitingFace => "awaiting_face",
            SessionState::VerifyingFace => "verifying_face",
            SessionState::Result => "result",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single live verification attempt.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub state: SessionState,
    pub credential_token: Option<String>,
    pub subject: Option<Subject>,
    pub captured_image: Option<CapturedImage>,
    pub result: Option<VerificationOutcome>,
    pub scan_paused: bool,
    /// Last rejection or fault, for display.
    pub last_error: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move one step along the cycle.
    pub fn advance(&mut self, next: SessionState) -> Result<SessionState, SessionError> {
        if !self.state.can_advance_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        let previous = self.state;
        self.state = next;
        Ok(previous)
    }

    pub fn subject_id(&self) -> Option<SubjectId> {
        self.subject.as_ref().map(|s| s.id)
    }

    pub fn snapshot(&self, epoch: u64) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            epoch,
            token: self.credential_token.as_deref().map(redact_token),
            subject: self.subject.clone(),
            has_image: self.captured_image.is_some(),
            result: self.result.clone(),
            scan_paused: self.scan_paused,
            last_error: self.last_error.clone(),
        }
    }
}

/// Read-only view of the session, safe to publish (the token is redacted and
/// the image omitted).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub epoch: u64,
    pub token: Option<String>,
    pub subject: Option<Subject>,
    pub has_image: bool,
    pub result: Option<VerificationOutcome>,
    pub scan_paused: bool,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL: [SessionState; 4] = [
        SessionState::AwaitingCredential,
        SessionState::AwaitingFace,
        SessionState::VerifyingFace,
        SessionState::Result,
    ];

    #[test]
    fn full_cycle_advances_in_order() {
        let mut session = Session::new();
        session.advance(SessionState::AwaitingFace).unwrap();
        session.advance(SessionState::VerifyingFace).unwrap();
        assert_eq!(
            session.advance(SessionState::Result),
            Ok(SessionState::VerifyingFace)
        );
    }

    #[test]
    fn skipping_a_state_is_rejected() {
        let mut session = Session::new();
        assert_eq!(
            session.advance(SessionState::VerifyingFace),
            Err(SessionError::InvalidTransition {
                from: SessionState::AwaitingCredential,
                to: SessionState::VerifyingFace,
            })
        );
        assert_eq!(session.state, SessionState::AwaitingCredential);
    }

    #[test]
    fn snapshot_redacts_token() {
        let session = Session {
            credential_token: Some("0b6f3c1e-7d2a".into()),
            scan_paused: true,
            ..Session::default()
        };
        let snapshot = session.snapshot(3);
        assert_eq!(snapshot.token.as_deref(), Some("0b6f…"));
        assert_eq!(snapshot.epoch, 3);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "awaiting_credential");
        assert_eq!(json["scan_paused"], true);
    }

    proptest! {
        /// Whatever sequence of advances is attempted, the state only ever
        /// moves forward one step at a time.
        #[test]
        fn advances_never_skip_or_go_back(steps in prop::collection::vec(0usize..4, 0..16)) {
            let mut session = Session::new();
            for step in steps {
                let before = session.state;
                let target = ALL[step];
                match session.advance(target) {
                    Ok(prev) => {
                        prop_assert_eq!(prev, before);
                        let i = ALL.iter().position(|s| *s == before).unwrap();
                        prop_assert_eq!(ALL[i + 1], target);
                    }
                    Err(_) => prop_assert_eq!(session.state, before),
                }
            }
        }
    }
}
