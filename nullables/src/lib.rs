//! Nullable infrastructure for deterministic testing.
//!
//! Every piece of hardware or remote service the kiosk talks to sits behind
//! a trait. This crate provides test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Record how they were used, for assertions
//! - Never touch a device or the network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod camera;
pub mod decoder;
pub mod verifier;

pub use camera::NullCamera;
pub use decoder::NullDecoder;
pub use verifier::{NullVerifier, VerifierCall};
