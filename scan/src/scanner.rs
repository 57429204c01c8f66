//! The continuous sampling loop.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kiosk_camera::{CameraHandle, CameraResource};
use kiosk_types::{CameraConstraints, ScanEvent, Timestamp};
use kiosk_utils::ScheduledTask;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::MissedTickBehavior;

use crate::{CodeDecoder, Deduplicator, ScanError};

/// Camera owner name used while the scanner holds the device.
pub const SCANNER_OWNER: &str = "scanner";

/// What the sampling loop reports to its consumer.
#[derive(Debug)]
pub enum ScanNotice {
    Scan(ScanEvent),
    /// Advisory only; the loop keeps running.
    Fault(ScanError),
}

#[derive(Debug, Default)]
struct Shared {
    paused: AtomicBool,
    dedup: Mutex<Deduplicator>,
    frames: AtomicU64,
}

impl Shared {
    fn dedup(&self) -> std::sync::MutexGuard<'_, Deduplicator> {
        self.dedup.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Samples the camera and emits deduplicated scan events.
///
/// While running, the sampling task owns the [`CameraHandle`]; stopping the
/// decoder waits for that task to finish, so the device is free by the time
/// [`ScanDecoder::stop`] returns.
pub struct ScanDecoder {
    camera: CameraResource,
    decoder: Arc<dyn CodeDecoder>,
    interval: Duration,
    shared: Arc<Shared>,
    task: Option<ScheduledTask>,
}

impl ScanDecoder {
    pub fn new(camera: CameraResource, decoder: Arc<dyn CodeDecoder>, interval: Duration) -> Self {
        Self {
            camera,
            decoder,
            interval,
            shared: Arc::new(Shared::default()),
            task: None,
        }
    }

    /// Acquire the camera and begin sampling. Scan events and faults are
    /// delivered on `notices`; when the channel is full, scans are dropped.
    ///
    /// Calling `start` while already running is a no-op.
    pub fn start(
        &mut self,
        constraints: &CameraConstraints,
        notices: mpsc::Sender<ScanNotice>,
    ) -> Result<(), ScanError> {
        if self.is_running() {
            return Ok(());
        }
        let handle = self.camera.acquire(SCANNER_OWNER, constraints)?;
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "scanner started");
        self.task = Some(ScheduledTask::spawn(
            "scan-loop",
            sample_loop(
                handle,
                self.decoder.clone(),
                self.shared.clone(),
                self.interval,
                notices,
            ),
        ));
        Ok(())
    }

    /// Stop sampling and release the camera. Safe to call when not running.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel_and_wait().await;
            tracing::info!("scanner stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// While paused, frames are still sampled but decoded values are dropped.
    pub fn pause(&self, paused: bool) {
        let was = self.shared.paused.swap(paused, Ordering::SeqCst);
        if was != paused {
            tracing::debug!(paused, "scanner pause toggled");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    /// Forget the last emitted value so the same code can be emitted again.
    pub fn reset(&self) {
        self.shared.dedup().reset();
    }

    pub fn frames_sampled(&self) -> u64 {
        self.shared.frames.load(Ordering::Relaxed)
    }
}

async fn sample_loop(
    mut handle: CameraHandle,
    decoder: Arc<dyn CodeDecoder>,
    shared: Arc<Shared>,
    period: Duration,
    notices: mpsc::Sender<ScanNotice>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut faulted = false;

    loop {
        ticker.tick().await;

        let frame = match handle.read_frame() {
            Ok(frame) => {
                faulted = false;
                frame
            }
            Err(e) => {
                // Report the first failure of a run, not every tick.
                if !faulted {
                    faulted = true;
                    tracing::warn!(error = %e, "scanner frame read failed");
                    if notices.try_send(ScanNotice::Fault(e.into())).is_err() && notices.is_closed() {
                        break;
                    }
                }
                continue;
            }
        };
        shared.frames.fetch_add(1, Ordering::Relaxed);

        let value = match decoder.decode(&frame) {
            Ok(Some(value)) => value,
            Ok(None) => continue,
            Err(e) => {
                tracing::trace!(error = %e, "frame not decoded");
                continue;
            }
        };

        if shared.paused.load(Ordering::SeqCst) {
            continue;
        }
        // The deduplicator only learns values that actually go out, so a
        // slot is reserved before it is consulted.
        let permit = match notices.try_reserve() {
            Ok(permit) => permit,
            Err(TrySendError::Full(())) => {
                tracing::debug!("scan dropped, consumer busy");
                continue;
            }
            Err(TrySendError::Closed(())) => break,
        };
        if !shared.dedup().offer(&value) {
            continue;
        }

        let event = ScanEvent::new(value, Timestamp::now());
        tracing::debug!(token = %event.redacted(), "code decoded");
        permit.send(ScanNotice::Scan(event));
    }

    handle.release();
}
