//! HttpVerifier against an in-process backend.

use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use kiosk_types::{CapturedImage, SubjectId};
use kiosk_verifier::{FailureCause, HttpVerifier, RemoteVerifier, VerifierConfig, VerifierError};
use serde_json::{json, Value};

async fn verify_qr(Json(body): Json<Value>) -> Response {
    match body["qr_code"].as_str() {
        Some("ABC123") => Json(json!({
            "status": "valid",
            "message": "QR code valid. Proceed to face verification.",
            "employee_id": 42,
            "first_name": "Ada",
        }))
        .into_response(),
        Some("BROKEN") => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Data consistency error" })),
        )
            .into_response(),
        Some("NOID") => Json(json!({ "status": "valid" })).into_response(),
        Some(_) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "status": "denied", "message": "Invalid or expired QR code." })),
        )
            .into_response(),
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing QR code" })),
        )
            .into_response(),
    }
}

async fn verify_face(Json(body): Json<Value>) -> Response {
    let image = body["image"].as_str().unwrap_or_default();
    if !image.starts_with("data:image/jpeg;base64,") {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid Base64 image" }))).into_response();
    }
    match body["employee_id"].as_u64() {
        Some(42) => Json(json!({
            "status": "granted",
            "message": "Access granted. Welcome, Ada!",
            "employee_id": 42,
        }))
        .into_response(),
        Some(7) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "status": "denied", "message": "Face does not match." })),
        )
            .into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({}))).into_response(),
    }
}

async fn verify_combined(mut multipart: Multipart) -> Response {
    let mut token = None;
    let mut face_len = 0;
    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name() {
            Some("qrData") => token = field.text().await.ok(),
            Some("faceImage") => face_len = field.bytes().await.map(|b| b.len()).unwrap_or(0),
            _ => {}
        }
    }
    if token.as_deref() == Some("ABC123") && face_len > 0 {
        Json(json!({
            "employee": { "id": 42, "name": "Ada Lovelace" },
            "timestamp": "2025-01-01T08:00:00",
        }))
        .into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Access denied" }))).into_response()
    }
}

async fn plain_text() -> &'static str {
    "ok"
}

async fn spawn_backend() -> String {
    let app = Router::new()
        .route("/api/employees/verify/qr", post(verify_qr))
        .route("/api/employees/verify/face", post(verify_face))
        .route("/api/employees/verify", post(verify_combined))
        .route("/plain", post(plain_text));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn still() -> CapturedImage {
    CapturedImage::new(vec![0xFF, 0xD8, 0xFF, 0xD9], 1, 1)
}

#[tokio::test]
async fn credential_grant_carries_subject() {
    let verifier = HttpVerifier::new(VerifierConfig::with_base_url(spawn_backend().await));
    let grant = verifier.verify_credential("ABC123").await.unwrap();
    assert_eq!(grant.subject.id, SubjectId::new(42));
    assert_eq!(grant.subject.name.as_deref(), Some("Ada"));
}

#[tokio::test]
async fn credential_rejection_keeps_backend_message() {
    let verifier = HttpVerifier::new(VerifierConfig::with_base_url(spawn_backend().await));
    let err = verifier.verify_credential("BAD").await.unwrap_err();
    assert_eq!(
        err,
        VerifierError::CredentialRejected {
            reason: "Invalid or expired QR code.".into(),
            cause: FailureCause::Rejected,
        }
    );
}

#[tokio::test]
async fn server_error_maps_to_credential_failure() {
    let verifier = HttpVerifier::new(VerifierConfig::with_base_url(spawn_backend().await));
    let err = verifier.verify_credential("BROKEN").await.unwrap_err();
    assert!(matches!(err, VerifierError::CredentialRejected { .. }));
    assert_eq!(err.cause(), FailureCause::Network);
    assert_eq!(err.reason(), "Data consistency error");
}

#[tokio::test]
async fn grant_without_subject_is_malformed() {
    let verifier = HttpVerifier::new(VerifierConfig::with_base_url(spawn_backend().await));
    let err = verifier.verify_credential("NOID").await.unwrap_err();
    assert_eq!(err.cause(), FailureCause::Malformed);
    assert_eq!(err.reason(), "Credential verification failed");
}

#[tokio::test]
async fn non_json_success_is_malformed() {
    let config = VerifierConfig {
        credential_path: "/plain".into(),
        ..VerifierConfig::with_base_url(spawn_backend().await)
    };
    let err = HttpVerifier::new(config).verify_credential("ABC123").await.unwrap_err();
    assert_eq!(err.cause(), FailureCause::Malformed);
}

#[tokio::test]
async fn unreachable_backend_is_a_network_failure() {
    let config = VerifierConfig {
        connect_timeout_ms: 500,
        ..VerifierConfig::with_base_url("http://127.0.0.1:1")
    };
    let err = HttpVerifier::new(config).verify_credential("ABC123").await.unwrap_err();
    assert!(matches!(err, VerifierError::CredentialRejected { .. }));
    assert_eq!(err.cause(), FailureCause::Network);
}

#[tokio::test]
async fn face_match_is_granted() {
    let verifier = HttpVerifier::new(VerifierConfig::with_base_url(spawn_backend().await));
    let outcome = verifier.verify_face(SubjectId::new(42), &still()).await.unwrap();
    assert!(outcome.ok);
    assert_eq!(outcome.subject.unwrap().id, SubjectId::new(42));
}

#[tokio::test]
async fn face_mismatch_is_denied_with_message() {
    let verifier = HttpVerifier::new(VerifierConfig::with_base_url(spawn_backend().await));
    let err = verifier.verify_face(SubjectId::new(7), &still()).await.unwrap_err();
    assert!(matches!(err, VerifierError::FaceVerificationFailed { .. }));
    assert_eq!(err.reason(), "Face does not match.");
}

#[tokio::test]
async fn face_failure_without_message_uses_fallback() {
    let verifier = HttpVerifier::new(VerifierConfig::with_base_url(spawn_backend().await));
    let err = verifier.verify_face(SubjectId::new(99), &still()).await.unwrap_err();
    assert_eq!(err.reason(), "Face verification failed");
    assert_eq!(err.cause(), FailureCause::Rejected);
}

#[tokio::test]
async fn combined_multipart_call() {
    let verifier = HttpVerifier::new(VerifierConfig::with_base_url(spawn_backend().await));
    let outcome = verifier.verify("ABC123", &still()).await.unwrap();
    let subject = outcome.subject.unwrap();
    assert_eq!(subject.name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(outcome.timestamp.as_deref(), Some("2025-01-01T08:00:00"));

    let err = verifier.verify("BAD", &still()).await.unwrap_err();
    assert!(matches!(err, VerifierError::FaceVerificationFailed { .. }));
    assert_eq!(err.reason(), "Access denied");
}
