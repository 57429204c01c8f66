//! A camera that presents the same picture on every frame.
//!
//! Used on benches without a webcam and for demonstrations: point it at a
//! photo of a badge or a face and the rest of the kiosk behaves as if the
//! picture were held in front of a real camera.

use std::path::Path;

use kiosk_types::{CameraConstraints, Frame};

use crate::{CameraBackend, CameraError, VideoStream};

pub struct StillImageBackend {
    frame: Frame,
}

impl StillImageBackend {
    pub fn from_frame(frame: Frame) -> Self {
        Self { frame }
    }

    /// Decode an image file (JPEG or PNG) into the frame to present.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CameraError> {
        let rgb = image::open(path.as_ref())?.to_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(Self::from_frame(Frame::rgb(width, height, rgb.into_raw())))
    }
}

impl CameraBackend for StillImageBackend {
    fn name(&self) -> &str {
        "still"
    }

    fn open(&self, _constraints: &CameraConstraints) -> Result<Box<dyn VideoStream>, CameraError> {
        Ok(Box::new(StillStream {
            frame: self.frame.clone(),
            live: true,
        }))
    }
}

struct StillStream {
    frame: Frame,
    live: bool,
}

impl VideoStream for StillStream {
    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        if !self.live {
            return Err(CameraError::Released);
        }
        Ok(self.frame.clone())
    }

    fn stop(&mut self) {
        self.live = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_png_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("badge.png");
        image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let backend = StillImageBackend::from_path(&path).unwrap();
        let mut stream = backend.open(&CameraConstraints::default()).unwrap();
        let frame = stream.read_frame().unwrap();
        assert_eq!((frame.width, frame.height), (3, 2));
        assert_eq!(&frame.data[..3], &[10, 20, 30]);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(StillImageBackend::from_path("/nonexistent/badge.png").is_err());
    }
}
