use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    /// Permission denied or no device matching the constraints.
    #[error("camera unavailable: {0}")]
    Unavailable(String),

    /// Another component still holds the device.
    #[error("camera busy: held by {holder}")]
    Busy { holder: &'static str },

    /// The handle was already released.
    #[error("camera handle already released")]
    Released,

    /// A single frame could not be read; the stream stays open.
    #[error("frame read failed: {0}")]
    Frame(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CameraError {
    /// Whether this error means the device could not be opened at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            CameraError::Unavailable(_) | CameraError::Busy { .. } | CameraError::Io(_)
        )
    }
}
