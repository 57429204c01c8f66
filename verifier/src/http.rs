//! HTTP client for the employee verification backend.

use std::time::Instant;

use async_trait::async_trait;
use kiosk_types::{redact_token, CapturedImage, SubjectId, VerificationOutcome};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;

use crate::error::{FailureCause, VerifierError};
use crate::response::VerifyResponse;
use crate::{CredentialGrant, RemoteVerifier, VerifierConfig};

/// Which of the two checks a request belongs to; decides the error variant.
#[derive(Clone, Copy, Debug)]
enum Check {
    Credential,
    Face,
}

impl Check {
    fn fail(self, cause: FailureCause, reason: Option<String>) -> VerifierError {
        match self {
            Check::Credential => VerifierError::credential(cause, reason),
            Check::Face => VerifierError::face(cause, reason),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Check::Credential => "credential",
            Check::Face => "face",
        }
    }
}

/// Talks to the backend over JSON (two-phase) or multipart (combined).
pub struct HttpVerifier {
    /// HTTP client (reusable connection pool).
    http_client: reqwest::Client,
    config: VerifierConfig,
}

impl HttpVerifier {
    pub fn new(config: VerifierConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            config,
        }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Send a prepared request and decode the body. Transport failures and
    /// non-2xx statuses become `check`'s domain error.
    async fn exchange(
        &self,
        check: Check,
        request: reqwest::RequestBuilder,
    ) -> Result<VerifyResponse, VerifierError> {
        let started = Instant::now();
        let response = request.send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                "Verification service timed out"
            } else if e.is_connect() {
                "Verification service unreachable"
            } else {
                "Verification request failed"
            };
            tracing::warn!(check = check.as_str(), error = %e, "verification request failed");
            check.fail(FailureCause::Network, Some(reason.to_owned()))
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            tracing::warn!(check = check.as_str(), error = %e, "verification body read failed");
            check.fail(FailureCause::Network, None)
        })?;
        let parsed = VerifyResponse::parse(&body);
        tracing::debug!(
            check = check.as_str(),
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "verification response"
        );

        if !status.is_success() {
            let cause = if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                FailureCause::Network
            } else {
                FailureCause::Rejected
            };
            return Err(check.fail(cause, parsed.and_then(|p| p.failure_reason())));
        }

        let parsed = parsed.ok_or_else(|| check.fail(FailureCause::Malformed, None))?;
        if parsed.is_denial() {
            return Err(check.fail(FailureCause::Rejected, parsed.failure_reason()));
        }
        Ok(parsed)
    }

    fn face_outcome(
        check: Check,
        parsed: VerifyResponse,
        known: Option<SubjectId>,
    ) -> Result<VerificationOutcome, VerifierError> {
        let subject = parsed
            .subject(known)
            .ok_or_else(|| check.fail(FailureCause::Malformed, None))?;
        Ok(VerificationOutcome::granted(subject, parsed.timestamp))
    }
}

#[async_trait]
impl RemoteVerifier for HttpVerifier {
    async fn verify_credential(&self, token: &str) -> Result<CredentialGrant, VerifierError> {
        let url = self.config.url(&self.config.credential_path);
        tracing::debug!(%url, token = %redact_token(token), "verifying credential");

        let request = self
            .http_client
            .post(&url)
            .json(&serde_json::json!({ "qr_code": token }));
        let parsed = self.exchange(Check::Credential, request).await?;

        let subject = parsed
            .subject(None)
            .ok_or_else(|| Check::Credential.fail(FailureCause::Malformed, None))?;
        Ok(CredentialGrant {
            subject,
            message: parsed.message,
        })
    }

    async fn verify_face(
        &self,
        subject: SubjectId,
        image: &CapturedImage,
    ) -> Result<VerificationOutcome, VerifierError> {
        let url = self.config.url(&self.config.face_path);
        tracing::debug!(%url, subject_id = %subject, bytes = image.len(), "verifying face");

        let request = self.http_client.post(&url).json(&serde_json::json!({
            "employee_id": subject.get(),
            "image": image.to_data_url(),
        }));
        let parsed = self.exchange(Check::Face, request).await?;
        Self::face_outcome(Check::Face, parsed, Some(subject))
    }

    async fn verify(
        &self,
        token: &str,
        image: &CapturedImage,
    ) -> Result<VerificationOutcome, VerifierError> {
        let url = self.config.url(&self.config.combined_path);
        tracing::debug!(%url, token = %redact_token(token), bytes = image.len(), "verifying credential and face");

        let face = Part::bytes(image.bytes.clone())
            .file_name("face.jpg")
            .mime_str(CapturedImage::MIME)
            .map_err(|_| Check::Face.fail(FailureCause::Malformed, None))?;
        let form = Form::new()
            .text("qrData", token.to_owned())
            .part("faceImage", face);

        let parsed = self
            .exchange(Check::Face, self.http_client.post(&url).multipart(form))
            .await?;
        Self::face_outcome(Check::Face, parsed, None)
    }
}
