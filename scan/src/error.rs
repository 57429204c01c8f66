use kiosk_camera::CameraError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// One frame could not be decoded. Never fatal; the loop keeps sampling.
    #[error("transient decode failure: {0}")]
    DecodeTransient(String),

    #[error("malformed frame: {width}x{height} with {len} bytes")]
    MalformedFrame { width: u32, height: u32, len: usize },

    #[error("camera: {0}")]
    Camera(#[from] CameraError),
}

impl ScanError {
    /// Whether the scanner lost (or never got) its camera.
    pub fn is_camera_fault(&self) -> bool {
        matches!(self, ScanError::Camera(_))
    }
}
