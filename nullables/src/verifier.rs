//! Nullable verifier: scripted answers, recorded calls.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use kiosk_types::{CapturedImage, Subject, SubjectId, VerificationOutcome};
use kiosk_verifier::{CredentialGrant, FailureCause, RemoteVerifier, VerifierError};

/// One request received by a [`NullVerifier`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerifierCall {
    Credential(String),
    Face { subject: SubjectId, bytes: usize },
    Combined { token: String, bytes: usize },
}

#[derive(Default)]
struct Script {
    credentials: HashMap<String, Result<Subject, String>>,
    faces: VecDeque<Result<VerificationOutcome, VerifierError>>,
    calls: Vec<VerifierCall>,
    latency: Duration,
}

/// A verifier that answers from a script.
///
/// Unknown tokens are rejected. Face checks consume scripted answers in
/// order and grant once the script runs out.
#[derive(Default)]
pub struct NullVerifier {
    script: Mutex<Script>,
}

impl NullVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every answer by `latency` (on the tokio clock).
    pub fn with_latency(self, latency: Duration) -> Self {
        self.script().latency = latency;
        self
    }

    pub fn grant_credential(&self, token: &str, subject: Subject) {
        self.script()
            .credentials
            .insert(token.to_owned(), Ok(subject));
    }

    pub fn reject_credential(&self, token: &str, reason: &str) {
        self.script()
            .credentials
            .insert(token.to_owned(), Err(reason.to_owned()));
    }

    /// Queue the answer to the next face (or combined) check.
    pub fn script_face(&self, answer: Result<VerificationOutcome, VerifierError>) {
        self.script().faces.push_back(answer);
    }

    pub fn calls(&self) -> Vec<VerifierCall> {
        self.script().calls.clone()
    }

    pub fn credential_calls(&self) -> usize {
        self.count(|c| matches!(c, VerifierCall::Credential(_)))
    }

    /// Face checks, including combined ones.
    pub fn face_calls(&self) -> usize {
        self.count(|c| !matches!(c, VerifierCall::Credential(_)))
    }

    fn count(&self, pred: impl Fn(&VerifierCall) -> bool) -> usize {
        self.script().calls.iter().filter(|c| pred(c)).count()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record `call` and return the configured latency.
    fn record(&self, call: VerifierCall) -> Duration {
        let mut script = self.script();
        script.calls.push(call);
        script.latency
    }

    async fn wait(latency: Duration) {
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn credential_answer(&self, token: &str) -> Result<Subject, String> {
        self.script()
            .credentials
            .get(token)
            .cloned()
            .unwrap_or_else(|| Err("Invalid or expired QR code.".to_owned()))
    }

    fn face_answer(&self, subject: Subject) -> Result<VerificationOutcome, VerifierError> {
        self.script()
            .faces
            .pop_front()
            .unwrap_or_else(|| Ok(VerificationOutcome::granted(subject, None)))
    }
}

#[async_trait]
impl RemoteVerifier for NullVerifier {
    async fn verify_credential(&self, token: &str) -> Result<CredentialGrant, VerifierError> {
        let latency = self.record(VerifierCall::Credential(token.to_owned()));
        Self::wait(latency).await;
        match self.credential_answer(token) {
            Ok(subject) => Ok(CredentialGrant {
                subject,
                message: None,
            }),
            Err(reason) => Err(VerifierError::credential(FailureCause::Rejected, Some(reason))),
        }
    }

    async fn verify_face(
        &self,
        subject: SubjectId,
        image: &CapturedImage,
    ) -> Result<VerificationOutcome, VerifierError> {
        let latency = self.record(VerifierCall::Face {
            subject,
            bytes: image.len(),
        });
        Self::wait(latency).await;
        self.face_answer(Subject::new(subject))
    }

    async fn verify(
        &self,
        token: &str,
        image: &CapturedImage,
    ) -> Result<VerificationOutcome, VerifierError> {
        let latency = self.record(VerifierCall::Combined {
            token: token.to_owned(),
            bytes: image.len(),
        });
        Self::wait(latency).await;
        match self.credential_answer(token) {
            Ok(subject) => self.face_answer(subject),
            Err(reason) => Err(VerifierError::face(FailureCause::Rejected, Some(reason))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn still() -> CapturedImage {
        CapturedImage::new(vec![1, 2, 3], 1, 1)
    }

    #[tokio::test]
    async fn unknown_tokens_are_rejected() {
        let verifier = NullVerifier::new();
        let err = verifier.verify_credential("BAD").await.unwrap_err();
        assert!(matches!(err, VerifierError::CredentialRejected { .. }));
        assert_eq!(verifier.calls(), vec![VerifierCall::Credential("BAD".into())]);
    }

    #[tokio::test]
    async fn scripted_face_answers_are_consumed_in_order() {
        let verifier = NullVerifier::new();
        verifier.script_face(Err(VerifierError::face(FailureCause::Rejected, None)));

        let first = verifier.verify_face(SubjectId::new(42), &still()).await;
        assert!(first.is_err());
        let second = verifier.verify_face(SubjectId::new(42), &still()).await.unwrap();
        assert!(second.ok);
        assert_eq!(verifier.face_calls(), 2);
    }

    #[tokio::test]
    async fn combined_uses_credential_script() {
        let verifier = NullVerifier::new();
        verifier.grant_credential("ABC123", Subject::with_name(SubjectId::new(42), "Ada"));

        let outcome = verifier.verify("ABC123", &still()).await.unwrap();
        assert_eq!(outcome.subject.unwrap().name.as_deref(), Some("Ada"));

        let err = verifier.verify("BAD", &still()).await.unwrap_err();
        assert!(matches!(err, VerifierError::FaceVerificationFailed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn latency_delays_the_answer() {
        let verifier = NullVerifier::new().with_latency(Duration::from_millis(300));
        let started = tokio::time::Instant::now();
        let _ = verifier.verify_credential("BAD").await;
        assert!(started.elapsed() >= Duration::from_millis(300));
    }
}
