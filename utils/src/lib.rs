//! Shared runtime utilities for the kiosk crates.

pub mod logging;
pub mod shutdown;
pub mod timer;

pub use logging::{init_logging, LogFormat};
pub use shutdown::ShutdownController;
pub use timer::ScheduledTask;
