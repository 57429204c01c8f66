//! Face capture for the kiosk.
//!
//! A [`CapturePipeline`] holds the camera for one capture segment: it is
//! started (acquiring the device), produces a JPEG still either on demand or
//! from an armed timer, and is confirmed (releasing the device) once the
//! still is handed over.

pub mod encode;
pub mod error;
pub mod pipeline;

pub use encode::encode_jpeg;
pub use error::CaptureError;
pub use pipeline::{AutoCapture, CapturePipeline, CaptureState, CAPTURE_OWNER};
