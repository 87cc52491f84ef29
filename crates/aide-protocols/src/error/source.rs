//! Update source errors.

use std::time::Duration;

use thiserror::Error;

/// Failure of a single call against the upstream platform.
///
/// The variants are transport-independent; clients translate their own
/// HTTP/status errors into one of these and never retry on their own.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// Bad credentials. Never retried.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// The platform asked us to slow down.
    #[error("Throttled: retry after {} seconds", .retry_after.as_secs())]
    Throttled { retry_after: Duration },

    /// Network failure, 5xx, or any other condition worth retrying.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// The platform refused the request as malformed.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Another consumer (or an active push endpoint) owns the update stream.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The long-poll window elapsed without data at the transport level.
    #[error("Long poll timed out")]
    TimedOut,
}

impl SourceError {
    /// Whether the caller may retry the same call later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SourceError::Throttled { .. } | SourceError::Transient(_) | SourceError::TimedOut
        )
    }

    /// Server-provided delay, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SourceError::Throttled { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Unauthenticated(_) => "unauthenticated",
            SourceError::Throttled { .. } => "throttled",
            SourceError::Transient(_) => "transient",
            SourceError::Rejected(_) => "rejected",
            SourceError::Conflict(_) => "conflict",
            SourceError::TimedOut => "timed_out",
        }
    }
}
