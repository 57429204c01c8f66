//! The kiosk's verification session.
//!
//! One [`Session`] exists per kiosk at any time. The
//! [`VerificationOrchestrator`] is its only writer: it runs as a single tokio
//! task that reacts to scan events, timer expiries, remote-call completions
//! and operator commands, one at a time. Every delayed action is a cancellable
//! task tagged with the session epoch, so nothing scheduled for a finished
//! session can touch the next one.

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod orchestrator;
pub mod state;

pub use config::{SessionConfig, VerificationFlow};
pub use error::SessionError;
pub use event::KioskEvent;
pub use metrics::KioskMetrics;
pub use orchestrator::{OrchestratorHandle, VerificationOrchestrator};
pub use state::{Session, SessionSnapshot, SessionState};
