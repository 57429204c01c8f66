//! Per-frame code decoding.

use kiosk_types::Frame;

use crate::ScanError;

/// Extracts a presented code from a single frame.
pub trait CodeDecoder: Send + Sync {
    /// `Ok(None)` when no code is visible. Errors are transient and only
    /// affect this frame.
    fn decode(&self, frame: &Frame) -> Result<Option<String>, ScanError>;
}

/// QR code decoder backed by `rqrr`.
#[derive(Debug, Default, Clone, Copy)]
pub struct QrDecoder;

impl CodeDecoder for QrDecoder {
    fn decode(&self, frame: &Frame) -> Result<Option<String>, ScanError> {
        if !frame.is_well_formed() {
            return Err(ScanError::MalformedFrame {
                width: frame.width,
                height: frame.height,
                len: frame.data.len(),
            });
        }

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            frame.width as usize,
            frame.height as usize,
            |x, y| frame.luma_at(x as u32, y as u32),
        );

        let mut last_err = None;
        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_meta, content)) => return Ok(Some(content)),
                Err(e) => last_err = Some(e),
            }
        }

        match last_err {
            // A grid was located but could not be read: blur, glare, partial view.
            Some(e) => Err(ScanError::DecodeTransient(e.to_string())),
            None => Ok(None),
        }
    }
}
