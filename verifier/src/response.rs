//! Lenient decoding of backend response bodies.
//!
//! The backend has answered in several shapes over time: a flat
//! `{status, message, employee_id, first_name}` object, or a nested
//! `{employee: {id, name}, timestamp}` one. Failures carry either `message`
//! or `error`. Every field is optional here; the caller decides what a
//! usable answer needs.

use kiosk_types::{Subject, SubjectId};
use serde::Deserialize;

/// Numeric ids sometimes arrive as JSON strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum IdValue {
    Number(u64),
    Text(String),
}

impl IdValue {
    fn to_subject_id(&self) -> Option<SubjectId> {
        match self {
            IdValue::Number(n) => Some(SubjectId::new(*n)),
            IdValue::Text(s) => s.trim().parse().ok().map(SubjectId::new),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EmployeeBody {
    #[serde(default)]
    pub id: Option<IdValue>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct VerifyResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub employee_id: Option<IdValue>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub employee: Option<EmployeeBody>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl VerifyResponse {
    /// Parse a body, treating an empty or non-JSON body as `None`.
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    /// Failure text: `message`, then `error`.
    pub fn failure_reason(&self) -> Option<String> {
        self.message.clone().or_else(|| self.error.clone())
    }

    /// Whether the body explicitly says no, even on a 2xx status.
    pub fn is_denial(&self) -> bool {
        matches!(self.status.as_deref(), Some("denied" | "invalid" | "rejected"))
    }

    pub fn subject_id(&self) -> Option<SubjectId> {
        self.employee_id
            .as_ref()
            .and_then(IdValue::to_subject_id)
            .or_else(|| {
                self.employee
                    .as_ref()
                    .and_then(|e| e.id.as_ref())
                    .and_then(IdValue::to_subject_id)
            })
    }

    /// Display name: `employee.name`, then `employee.first_name`, then
    /// top-level `first_name`.
    pub fn subject_name(&self) -> Option<String> {
        self.employee
            .as_ref()
            .and_then(|e| e.name.clone().or_else(|| e.first_name.clone()))
            .or_else(|| self.first_name.clone())
    }

    /// Build the subject, falling back to `known` when the body has no id.
    pub fn subject(&self, known: Option<SubjectId>) -> Option<Subject> {
        let id = self.subject_id().or(known)?;
        Some(Subject {
            id,
            name: self.subject_name(),
        })
    }
}
