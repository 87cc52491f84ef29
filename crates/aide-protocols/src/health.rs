//! Health reporting protocol.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

/// Health status of a component or of the whole process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Component is healthy.
    Healthy,
    /// Component is degraded but functioning.
    Degraded,
    /// Component is unhealthy.
    Unhealthy,
    /// Health status is unknown.
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Individual component health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name.
    pub name: String,
    /// Component health status.
    pub status: HealthStatus,
    /// Optional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ComponentCheck {
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Trait for components that can be health-checked.
/// Uses boxed futures for dyn compatibility.
pub trait HealthCheckable: Send + Sync {
    /// Get the component name.
    fn name(&self) -> &str;

    /// Perform a health check.
    fn check_health(&self) -> Pin<Box<dyn Future<Output = ComponentCheck> + Send + '_>>;
}
