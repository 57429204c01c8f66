//! Code scanning for the kiosk.
//!
//! [`ScanDecoder`] samples frames from the camera on a fixed interval, hands
//! each one to a [`CodeDecoder`] and forwards the decoded payloads as
//! [`ScanEvent`](kiosk_types::ScanEvent)s, suppressing repeats of the value it
//! emitted last.

pub mod decoder;
pub mod dedup;
pub mod error;
pub mod scanner;

pub use decoder::{CodeDecoder, QrDecoder};
pub use dedup::Deduplicator;
pub use error::ScanError;
pub use scanner::{ScanDecoder, ScanNotice};
