//! Fundamental types for the admission kiosk.
//!
//! This crate defines the value types shared across every other crate in the
//! workspace: subjects, scan events, video frames, encoded stills, camera
//! constraints, verification outcomes and timestamps.

pub mod frame;
pub mod outcome;
pub mod scan;
pub mod still;
pub mod subject;
pub mod time;

pub use frame::{CameraConstraints, FacingMode, Frame, PixelFormat};
pub use outcome::VerificationOutcome;
pub use scan::{redact_token, ScanEvent};
pub use still::CapturedImage;
pub use subject::{Subject, SubjectId};
pub use time::Timestamp;
