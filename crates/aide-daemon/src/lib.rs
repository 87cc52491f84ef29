//! # Aide Daemon
//!
//! Process lifecycle support for the Aide backend.
//!
//! ## Features
//!
//! - PID file single-instance guard (a second consumer refuses to start)
//! - Signal handling (SIGTERM/SIGINT for graceful shutdown, a second signal forces exit)
//! - Periodic health check loop over registered components

pub mod error;
pub mod health;
pub mod pid;
pub mod signal;

// Re-exports
pub use error::DaemonError;
pub use health::{HealthCheckResult, HealthChecker, LivenessCheck};
pub use pid::PidFile;
pub use signal::{DaemonSignal, SignalHandler};
