//! Kiosk daemon: entry point for running a verification kiosk.

mod config;
mod status;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use kiosk_camera::{CameraBackend, CameraResource, StillImageBackend};
use kiosk_scan::QrDecoder;
use kiosk_session::{KioskMetrics, VerificationFlow, VerificationOrchestrator};
use kiosk_utils::{init_logging, LogFormat, ShutdownController};
use kiosk_verifier::HttpVerifier;
use tokio::net::TcpListener;

use crate::config::KioskConfig;

#[derive(Parser, Debug)]
#[command(name = "kiosk-daemon", about = "Badge and face verification kiosk")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "KIOSK_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the verification backend.
    #[arg(long, env = "KIOSK_VERIFIER_URL")]
    verifier_url: Option<String>,

    /// Hold the face result on screen until dismissed.
    #[arg(long, conflicts_with = "background")]
    foreground: bool,

    /// Reset on a timer without waiting for the face result.
    #[arg(long)]
    background: bool,

    /// Submit badge and face together in one request.
    #[arg(long, env = "KIOSK_COMBINED")]
    combined: bool,

    /// V4L2 device index (`/dev/videoN`).
    #[arg(long, env = "KIOSK_CAMERA_DEVICE")]
    camera_device: Option<usize>,

    /// Serve frames from a still image instead of a device.
    #[arg(long, env = "KIOSK_STILL_IMAGE")]
    still_image: Option<PathBuf>,

    /// Log filter, e.g. "info" or "info,kiosk_session=debug".
    #[arg(long, env = "KIOSK_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output: "human" or "json".
    #[arg(long, env = "KIOSK_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Serve the status API on this port.
    #[arg(long, env = "KIOSK_STATUS_PORT")]
    status_port: Option<u16>,
}

impl Cli {
    /// Overlay the command line on a loaded configuration.
    fn apply(&self, mut config: KioskConfig) -> KioskConfig {
        if let Some(url) = &self.verifier_url {
            config.verifier.base_url = url.clone();
        }
        if self.foreground {
            config.session.block_on_face_result = true;
        }
        if self.background {
            config.session.block_on_face_result = false;
        }
        if self.combined {
            config.session.flow = VerificationFlow::Combined;
        }
        if let Some(device) = self.camera_device {
            config.camera.device = device;
        }
        if let Some(path) = &self.still_image {
            config.camera.still_image = Some(path.clone());
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if let Some(port) = self.status_port {
            config.status.enabled = true;
            config.status.port = port;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => KioskConfig::load(path)?,
        None => KioskConfig::default(),
    };
    let config = cli.apply(file_config);

    init_logging(config.logging.format, &config.logging.level);
    if let Some(path) = &cli.config {
        tracing::info!(path = %path.display(), "loaded config");
    }

    let backend = open_backend(&config)?;
    let camera = CameraResource::new(backend);
    let verifier = Arc::new(HttpVerifier::new(config.verifier.clone()));
    let metrics = Arc::new(KioskMetrics::new());

    tracing::info!(
        backend = camera.backend_name(),
        verifier = %config.verifier.base_url,
        background = !config.session.block_on_face_result,
        flow = ?config.session.flow,
        "starting kiosk"
    );

    let (handle, orchestrator) = VerificationOrchestrator::spawn(
        config.session.clone(),
        camera,
        Arc::new(QrDecoder),
        verifier,
        metrics,
    );

    let shutdown = Arc::new(ShutdownController::new());

    let status_server = if config.status.enabled {
        let addr = format!("{}:{}", config.status.bind, config.status.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind status server on {addr}"))?;
        Some(tokio::spawn(status::serve(
            listener,
            handle.clone(),
            shutdown.clone(),
        )))
    } else {
        None
    };

    shutdown.wait_for_signal().await;

    if let Err(e) = handle.shutdown().await {
        tracing::warn!(error = %e, "orchestrator already stopped");
    }
    if let Err(e) = orchestrator.await {
        tracing::error!(error = %e, "orchestrator task failed");
    }
    if let Some(server) = status_server {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "status server failed"),
            Err(e) => tracing::error!(error = %e, "status server task failed"),
        }
    }

    tracing::info!("kiosk daemon exited cleanly");
    Ok(())
}

fn open_backend(config: &KioskConfig) -> anyhow::Result<Arc<dyn CameraBackend>> {
    if let Some(path) = &config.camera.still_image {
        let backend = StillImageBackend::from_path(path)
            .with_context(|| format!("failed to load still image {}", path.display()))?;
        return Ok(Arc::new(backend));
    }

    #[cfg(feature = "v4l2")]
    {
        Ok(Arc::new(kiosk_camera::V4l2Backend::new(config.camera.device)))
    }

    #[cfg(not(feature = "v4l2"))]
    {
        anyhow::bail!(
            "no camera source: built without V4L2 support and camera.still_image is not set \
             (requested /dev/video{})",
            config.camera.device
        )
    }
}
