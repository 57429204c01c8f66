//! Operator status API.
//!
//! `GET /status` returns the session snapshot, `GET /metrics` the Prometheus
//! exposition, `POST /dismiss` and `POST /retake` drive the session, and
//! `/ws` streams [`KioskEvent`](kiosk_session::KioskEvent)s as JSON text
//! frames.

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use kiosk_session::{OrchestratorHandle, SessionSnapshot};
use kiosk_utils::ShutdownController;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
struct StatusState {
    handle: OrchestratorHandle,
    shutdown: Arc<ShutdownController>,
}

pub fn router(handle: OrchestratorHandle, shutdown: Arc<ShutdownController>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/metrics", get(metrics))
        .route("/dismiss", post(dismiss))
        .route("/retake", post(retake))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(StatusState { handle, shutdown })
}

/// Serve until the shutdown controller fires.
pub async fn serve(
    listener: TcpListener,
    handle: OrchestratorHandle,
    shutdown: Arc<ShutdownController>,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    let stop = shutdown.clone();
    tracing::info!(%addr, "status server listening");
    axum::serve(listener, router(handle, shutdown))
        .with_graceful_shutdown(async move { stop.wait().await })
        .await?;
    tracing::info!("status server stopped");
    Ok(())
}

async fn status(State(state): State<StatusState>) -> Json<SessionSnapshot> {
    Json(state.handle.snapshot())
}

async fn metrics(State(state): State<StatusState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.handle.metrics().encode_text(),
    )
}

async fn dismiss(State(state): State<StatusState>) -> impl IntoResponse {
    match state.handle.dismiss() {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

async fn retake(State(state): State<StatusState>) -> impl IntoResponse {
    match state.handle.retake() {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<StatusState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Forward session events to one client until it disconnects or the daemon
/// shuts down. Client messages other than close are ignored.
async fn handle_socket(socket: WebSocket, state: StatusState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut events = state.handle.subscribe();
    let stop = state.shutdown.clone();
    tracing::debug!("status client connected");

    let forwarder = tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => {
                        let text = match serde_json::to_string(&event) {
                            Ok(text) => text,
                            Err(e) => {
                                tracing::warn!(error = %e, "failed to serialize kiosk event");
                                continue;
                            }
                        };
                        if ws_sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "status client lagging, events skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = stop.wait() => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
    forwarder.abort();
    tracing::debug!("status client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_nullables::{NullCamera, NullDecoder, NullVerifier};
    use kiosk_session::{KioskMetrics, SessionConfig, VerificationOrchestrator};
    use tokio::task::JoinHandle;

    async fn spawn_status() -> (String, OrchestratorHandle, JoinHandle<()>, NullCamera) {
        let camera = NullCamera::new();
        let (handle, task) = VerificationOrchestrator::spawn(
            SessionConfig::default(),
            camera.resource(),
            Arc::new(NullDecoder::new()),
            Arc::new(NullVerifier::new()),
            Arc::new(KioskMetrics::new()),
        );
        let shutdown = Arc::new(ShutdownController::new());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(serve(listener, handle.clone(), shutdown));
        (base, handle, task, camera)
    }

    #[tokio::test]
    async fn status_reports_snapshot() {
        let (base, handle, _task, _camera) = spawn_status().await;
        let body: serde_json::Value = reqwest::get(format!("{base}/status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["state"], "awaiting_credential");
        assert_eq!(body["scan_paused"], false);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn metrics_are_exposed_as_text() {
        let (base, handle, _task, _camera) = spawn_status().await;
        let response = reqwest::get(format!("{base}/metrics")).await.unwrap();
        assert!(response.status().is_success());
        let text = response.text().await.unwrap();
        assert!(text.contains("kiosk_resets_total"));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn dismiss_resets_the_session() {
        let (base, handle, _task, _camera) = spawn_status().await;
        let client = reqwest::Client::new();
        let response = client.post(format!("{base}/dismiss")).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

        let mut watch = handle.watch();
        watch.wait_for(|s| s.epoch == 1).await.unwrap();
        assert_eq!(handle.metrics().resets.get(), 1);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn commands_after_stop_are_unavailable() {
        let (base, handle, task, camera) = spawn_status().await;
        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert_eq!(camera.open_streams(), 0);

        let client = reqwest::Client::new();
        let response = client.post(format!("{base}/retake")).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn shutdown_stops_the_server() {
        let camera = NullCamera::new();
        let (handle, _task) = VerificationOrchestrator::spawn(
            SessionConfig::default(),
            camera.resource(),
            Arc::new(NullDecoder::new()),
            Arc::new(NullVerifier::new()),
            Arc::new(KioskMetrics::new()),
        );
        let shutdown = Arc::new(ShutdownController::new());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = tokio::spawn(serve(listener, handle.clone(), shutdown.clone()));

        shutdown.shutdown();
        server.await.unwrap().unwrap();
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn server_started_after_shutdown_exits() {
        let camera = NullCamera::new();
        let (handle, _task) = VerificationOrchestrator::spawn(
            SessionConfig::default(),
            camera.resource(),
            Arc::new(NullDecoder::new()),
            Arc::new(NullVerifier::new()),
            Arc::new(KioskMetrics::new()),
        );
        let shutdown = Arc::new(ShutdownController::new());
        shutdown.shutdown();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            serve(listener, handle.clone(), shutdown),
        )
        .await
        .expect("server should not outlive an earlier shutdown")
        .unwrap();
        handle.shutdown().await.unwrap();
    }
}
