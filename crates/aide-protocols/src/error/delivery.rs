//! Delivery layer errors.

use thiserror::Error;

use super::SourceError;

/// Errors surfaced by the delivery subsystem to the process supervisor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// Bad credentials: stop the subsystem.
    #[error("Fatal delivery error: {0}")]
    Fatal(String),

    /// Another consumer owns the stream; this instance must stand down.
    #[error("Update stream owned by another consumer: {0}")]
    Conflict(String),

    /// Network or timeout failure; retried by policy.
    #[error("Transient delivery error: {0}")]
    Transient(String),

    /// Invalid target or request, rejected before (or instead of) retrying.
    #[error("Delivery configuration error: {0}")]
    Configuration(String),
}

impl DeliveryError {
    /// Whether this error should stop the subsystem rather than be retried.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryError::Transient(_))
    }
}

impl From<SourceError> for DeliveryError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Unauthenticated(msg) => DeliveryError::Fatal(msg),
            SourceError::Conflict(msg) => DeliveryError::Conflict(msg),
            SourceError::Rejected(msg) => DeliveryError::Configuration(msg),
            other @ (SourceError::Throttled { .. }
            | SourceError::Transient(_)
            | SourceError::TimedOut) => DeliveryError::Transient(other.to_string()),
        }
    }
}
