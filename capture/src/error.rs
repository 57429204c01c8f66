use kiosk_camera::CameraError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// A timed capture fired after the stream it was armed for went away.
    #[error("capture fired against a released or replaced stream")]
    StaleCapture,

    #[error("capture pipeline not started")]
    NotStarted,

    #[error("capture pipeline already confirmed; start it again first")]
    Inert,

    #[error("no still has been captured")]
    NothingCaptured,

    #[error("camera: {0}")]
    Camera(#[from] CameraError),

    #[error("encode: {0}")]
    Encode(#[from] image::ImageError),
}

impl CaptureError {
    /// Whether the camera itself could not be opened (permission, missing
    /// device, held elsewhere).
    pub fn is_camera_unavailable(&self) -> bool {
        matches!(self, CaptureError::Camera(e) if e.is_unavailable())
    }
}
