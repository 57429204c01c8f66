use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, Rgb};
use kiosk_camera::CameraError;
use kiosk_types::{CapturedImage, Frame};

use crate::CaptureError;

/// Encode a frame as a baseline JPEG at `quality` (1..=100).
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<CapturedImage, CaptureError> {
    let rgb: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_raw(frame.width, frame.height, frame.to_rgb()).ok_or_else(|| {
            CameraError::Frame(format!(
                "{}x{} frame with {} bytes",
                frame.width,
                frame.height,
                frame.data.len()
            ))
        })?;

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(&rgb)?;
    Ok(CapturedImage::new(buf, frame.width, frame.height))
}
