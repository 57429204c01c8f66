//! Device abstraction implemented by real and test cameras.

use kiosk_types::{CameraConstraints, Frame};

use crate::CameraError;

/// An open video stream and its tracks.
pub trait VideoStream: Send {
    /// Read the frame currently presented by the device.
    fn read_frame(&mut self) -> Result<Frame, CameraError>;

    /// Stop every track. Must be safe to call more than once.
    fn stop(&mut self);
}

/// Something that can open a [`VideoStream`] for given constraints.
pub trait CameraBackend: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    fn open(&self, constraints: &CameraConstraints) -> Result<Box<dyn VideoStream>, CameraError>;
}
