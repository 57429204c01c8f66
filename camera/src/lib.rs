//! Camera ownership for the kiosk.
//!
//! A [`CameraResource`] wraps one physical device behind a
//! [`CameraBackend`]. Components acquire a [`CameraHandle`] for a bounded
//! window; the handle stops its tracks when released or dropped, so the
//! device is freed on success, error and forced teardown alike. The
//! resource admits a single open handle at a time, which is how the scanner
//! and the capture pipeline hand the device to each other.

pub mod backend;
pub mod convert;
pub mod error;
pub mod resource;
pub mod still;
#[cfg(feature = "v4l2")]
pub mod v4l2;

pub use backend::{CameraBackend, VideoStream};
pub use error::CameraError;
pub use resource::{CameraHandle, CameraResource};
pub use still::StillImageBackend;
#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Backend;
