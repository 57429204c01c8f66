//! The remote verification boundary.
//!
//! The kiosk consumes two checks from a backend: exchanging a credential
//! token for a subject, and matching a face still against that subject. A
//! combined single-call variant submits both at once. [`RemoteVerifier`] is
//! the seam; [`HttpVerifier`] talks to the employee REST backend.

pub mod config;
pub mod error;
pub mod http;
pub mod response;

use async_trait::async_trait;
use kiosk_types::{CapturedImage, Subject, SubjectId, VerificationOutcome};

pub use config::VerifierConfig;
pub use error::{FailureCause, VerifierError};
pub use http::HttpVerifier;

/// A successful credential check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialGrant {
    pub subject: Subject,
    pub message: Option<String>,
}

#[async_trait]
pub trait RemoteVerifier: Send + Sync {
    /// Exchange a scanned credential token for the subject it was issued to.
    ///
    /// Fails with [`VerifierError::CredentialRejected`].
    async fn verify_credential(&self, token: &str) -> Result<CredentialGrant, VerifierError>;

    /// Match `image` against `subject`. Only granted outcomes are returned as
    /// `Ok`; denials fail with [`VerifierError::FaceVerificationFailed`].
    async fn verify_face(
        &self,
        subject: SubjectId,
        image: &CapturedImage,
    ) -> Result<VerificationOutcome, VerifierError>;

    /// Single-call variant: token and face in one request.
    async fn verify(
        &self,
        token: &str,
        image: &CapturedImage,
    ) -> Result<VerificationOutcome, VerifierError>;
}
