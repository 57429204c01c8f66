//! The capture pipeline and its timed trigger.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use kiosk_camera::{CameraHandle, CameraResource};
use kiosk_types::{CameraConstraints, CapturedImage};
use kiosk_utils::ScheduledTask;

use crate::{encode_jpeg, CaptureError};

/// Camera owner name used while the capture pipeline holds the device.
pub const CAPTURE_OWNER: &str = "capture";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    /// Never started, or torn down.
    Idle,
    /// Camera open, live preview available.
    Live,
    /// Camera released after handing over a still. Needs `start` or `retake`.
    Confirmed,
}

struct Inner {
    state: CaptureState,
    handle: Option<CameraHandle>,
    captured: Option<CapturedImage>,
    /// Bumped whenever the stream a timer might have been armed for goes away.
    generation: u64,
}

impl Inner {
    fn drop_stream(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.release();
        }
        self.generation += 1;
    }

    fn capture(&mut self, quality: u8) -> Result<CapturedImage, CaptureError> {
        let handle = match (self.state, self.handle.as_mut()) {
            (CaptureState::Live, Some(handle)) => handle,
            (CaptureState::Confirmed, _) => return Err(CaptureError::Inert),
            _ => return Err(CaptureError::NotStarted),
        };
        let frame = handle.read_frame()?;
        let still = encode_jpeg(&frame, quality)?;
        tracing::debug!(bytes = still.len(), width = still.width, height = still.height, "still captured");
        self.captured = Some(still.clone());
        Ok(still)
    }
}

/// Single-shot still capture over one exclusively held camera.
///
/// Clones share the same pipeline.
#[derive(Clone)]
pub struct CapturePipeline {
    camera: CameraResource,
    constraints: CameraConstraints,
    quality: u8,
    inner: Arc<Mutex<Inner>>,
}

impl CapturePipeline {
    pub fn new(camera: CameraResource, constraints: CameraConstraints, quality: u8) -> Self {
        Self {
            camera,
            constraints,
            quality,
            inner: Arc::new(Mutex::new(Inner {
                state: CaptureState::Idle,
                handle: None,
                captured: None,
                generation: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> CaptureState {
        self.lock().state
    }

    pub fn has_capture(&self) -> bool {
        self.lock().captured.is_some()
    }

    /// Acquire the camera and go live. A no-op when already live.
    pub fn start(&self) -> Result<(), CaptureError> {
        let mut inner = self.lock();
        if inner.state == CaptureState::Live && inner.handle.is_some() {
            return Ok(());
        }
        let handle = self.camera.acquire(CAPTURE_OWNER, &self.constraints)?;
        inner.handle = Some(handle);
        inner.captured = None;
        inner.state = CaptureState::Live;
        inner.generation += 1;
        Ok(())
    }

    /// Grab the current frame as a JPEG still. The camera stays open.
    pub fn capture_manual(&self) -> Result<CapturedImage, CaptureError> {
        self.lock().capture(self.quality)
    }

    /// Schedule one capture after `delay` and hand its result to `on_fire`.
    ///
    /// The pipeline must be live. If the stream is released or replaced
    /// before the timer fires, `on_fire` receives
    /// [`CaptureError::StaleCapture`]. Dropping or cancelling the returned
    /// [`AutoCapture`] prevents `on_fire` from running at all.
    pub fn arm_automatic_capture<F>(&self, delay: Duration, on_fire: F) -> Result<AutoCapture, CaptureError>
    where
        F: FnOnce(Result<CapturedImage, CaptureError>) + Send + 'static,
    {
        let generation = {
            let inner = self.lock();
            match (inner.state, inner.handle.is_some()) {
                (CaptureState::Live, true) => inner.generation,
                (CaptureState::Confirmed, _) => return Err(CaptureError::Inert),
                _ => return Err(CaptureError::NotStarted),
            }
        };

        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        let quality = self.quality;
        let task = ScheduledTask::after("auto-capture", delay, async move {
            let result = match weak.upgrade() {
                Some(inner) => {
                    let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
                    if inner.generation == generation {
                        inner.capture(quality)
                    } else {
                        Err(CaptureError::StaleCapture)
                    }
                }
                None => Err(CaptureError::StaleCapture),
            };
            if let Err(e) = &result {
                tracing::warn!(error = %e, "automatic capture failed");
            }
            on_fire(result);
        });

        tracing::debug!(delay_ms = delay.as_millis() as u64, generation, "automatic capture armed");
        Ok(AutoCapture { task })
    }

    /// Discard the captured still and make sure the camera is live again.
    ///
    /// Timers armed before the retake become stale.
    pub fn retake(&self) -> Result<(), CaptureError> {
        let mut inner = self.lock();
        inner.captured = None;
        inner.generation += 1;
        if inner.handle.is_none() {
            inner.handle = Some(self.camera.acquire(CAPTURE_OWNER, &self.constraints)?);
        }
        inner.state = CaptureState::Live;
        tracing::debug!("capture retaken");
        Ok(())
    }

    /// Release the camera and hand over the captured still.
    ///
    /// The pipeline stays inert until started again.
    pub fn confirm(&self) -> Result<CapturedImage, CaptureError> {
        let mut inner = self.lock();
        let still = inner.captured.take().ok_or(CaptureError::NothingCaptured)?;
        inner.drop_stream();
        inner.state = CaptureState::Confirmed;
        tracing::debug!(bytes = still.len(), "capture confirmed, camera released");
        Ok(still)
    }

    /// Release everything and return to idle. Idempotent.
    pub fn teardown(&self) {
        let mut inner = self.lock();
        if inner.state == CaptureState::Idle && inner.handle.is_none() {
            return;
        }
        inner.drop_stream();
        inner.captured = None;
        inner.state = CaptureState::Idle;
        tracing::debug!("capture pipeline torn down");
    }
}

impl std::fmt::Debug for CapturePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("CapturePipeline")
            .field("state", &inner.state)
            .field("captured", &inner.captured.is_some())
            .field("generation", &inner.generation)
            .finish()
    }
}

/// A pending timed capture. Dropping it cancels the timer.
#[derive(Debug)]
pub struct AutoCapture {
    task: ScheduledTask,
}

impl AutoCapture {
    /// Returns `true` if the timer had not fired yet.
    pub fn cancel(&mut self) -> bool {
        self.task.cancel()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
