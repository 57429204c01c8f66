//! Result of a face (or combined) verification.

use crate::Subject;
use serde::{Deserialize, Serialize};

/// What the remote verifier decided for one admission attempt.
///
/// Not persisted by the kiosk; it lives in the session until the next reset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,
    /// Backend-supplied time of the decision, passed through verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

impl VerificationOutcome {
    pub fn granted(subject: Subject, timestamp: Option<String>) -> Self {
        Self {
            ok: true,
            subject: Some(subject),
            timestamp,
            error_reason: None,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            subject: None,
            timestamp: None,
            error_reason: Some(reason.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SubjectId;

    #[test]
    fn denied_outcome_omits_subject_in_json() {
        let json = serde_json::to_value(VerificationOutcome::denied("no match")).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["error_reason"], "no match");
        assert!(json.get("subject").is_none());
    }

    #[test]
    fn granted_outcome_carries_subject() {
        let outcome = VerificationOutcome::granted(
            Subject::with_name(SubjectId::new(42), "Ada"),
            Some("2025-01-01T08:00:00".into()),
        );
        assert!(outcome.ok);
        assert_eq!(outcome.subject.unwrap().id.get(), 42);
    }
}
