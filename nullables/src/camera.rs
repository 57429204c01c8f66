//! Nullable camera: a device that counts its open streams.

use std::sync::{Arc, Mutex, MutexGuard};

use kiosk_camera::{CameraBackend, CameraError, CameraResource, VideoStream};
use kiosk_types::{CameraConstraints, Frame};

#[derive(Debug, Default)]
struct Usage {
    deny: bool,
    opens: usize,
    open_now: usize,
    max_open: usize,
}

/// A camera backend serving a fixed frame.
///
/// Counts opens and tracks how many streams are open at once, independently
/// of [`CameraResource`]'s own bookkeeping, so tests can check that the
/// device is never opened twice.
#[derive(Clone)]
pub struct NullCamera {
    frame: Frame,
    usage: Arc<Mutex<Usage>>,
}

impl NullCamera {
    pub fn new() -> Self {
        Self::with_frame(Frame::blank(8, 8))
    }

    pub fn with_frame(frame: Frame) -> Self {
        Self {
            frame,
            usage: Arc::new(Mutex::new(Usage::default())),
        }
    }

    /// A [`CameraResource`] backed by this camera.
    pub fn resource(&self) -> CameraResource {
        CameraResource::new(Arc::new(self.clone()))
    }

    /// Refuse (or allow again) every subsequent open.
    pub fn deny_access(&self, deny: bool) {
        self.usage().deny = deny;
    }

    /// Total successful opens.
    pub fn opens(&self) -> usize {
        self.usage().opens
    }

    /// Streams currently open.
    pub fn open_streams(&self) -> usize {
        self.usage().open_now
    }

    /// Highest number of streams ever open at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.usage().max_open
    }

    fn usage(&self) -> MutexGuard<'_, Usage> {
        self.usage.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for NullCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for NullCamera {
    fn name(&self) -> &str {
        "null"
    }

    fn open(&self, _constraints: &CameraConstraints) -> Result<Box<dyn VideoStream>, CameraError> {
        let mut usage = self.usage();
        if usage.deny {
            return Err(CameraError::Unavailable("permission denied".into()));
        }
        usage.opens += 1;
        usage.open_now += 1;
        usage.max_open = usage.max_open.max(usage.open_now);
        Ok(Box::new(NullStream {
            frame: self.frame.clone(),
            usage: self.usage.clone(),
            open: true,
        }))
    }
}

struct NullStream {
    frame: Frame,
    usage: Arc<Mutex<Usage>>,
    open: bool,
}

impl VideoStream for NullStream {
    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        if !self.open {
            return Err(CameraError::Released);
        }
        Ok(self.frame.clone())
    }

    fn stop(&mut self) {
        if std::mem::take(&mut self.open) {
            let mut usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
            usage.open_now -= 1;
        }
    }
}

impl Drop for NullStream {
    fn drop(&mut self) {
        self.stop();
    }
}
