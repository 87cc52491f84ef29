//! Health checking for the server process.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use aide_protocols::health::{ComponentCheck, HealthCheckable, HealthStatus};

/// Health check result with details.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    /// Overall health status.
    pub status: HealthStatus,
    /// Timestamp of the check.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Individual component checks.
    pub checks: Vec<ComponentCheck>,
    /// Optional message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthCheckResult {
    /// Create a healthy result.
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            timestamp: chrono::Utc::now(),
            checks: Vec::new(),
            message: None,
        }
    }

    /// Add a component check.
    pub fn with_check(mut self, check: ComponentCheck) -> Self {
        // Overall status follows the worst component
        match check.status {
            HealthStatus::Unhealthy => {
                self.status = HealthStatus::Unhealthy;
                self.message = Some(format!("{} is unhealthy", check.name));
            }
            HealthStatus::Degraded if self.status != HealthStatus::Unhealthy => {
                self.status = HealthStatus::Degraded;
            }
            _ => {}
        }
        self.checks.push(check);
        self
    }
}

/// Health checker that periodically checks registered components.
pub struct HealthChecker {
    interval: Duration,
    components: RwLock<Vec<Arc<dyn HealthCheckable>>>,
    last_check: RwLock<Option<HealthCheckResult>>,
    check_count: AtomicU64,
    failure_count: AtomicU64,
}

impl HealthChecker {
    /// Create a new health checker.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            components: RwLock::new(Vec::new()),
            last_check: RwLock::new(None),
            check_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
        }
    }

    /// Register a component for health checking.
    pub async fn register(&self, component: Arc<dyn HealthCheckable>) {
        let mut components = self.components.write().await;
        info!("Registered health check component: {}", component.name());
        components.push(component);
    }

    /// Perform a health check on all components.
    pub async fn check(&self) -> HealthCheckResult {
        let start = Instant::now();
        self.check_count.fetch_add(1, Ordering::SeqCst);

        let components = self.components.read().await;
        let mut result = HealthCheckResult::healthy();

        for component in components.iter() {
            let check = component.check_health().await;
            debug!("Health check for {}: {}", check.name, check.status);
            result = result.with_check(check);
        }

        debug!("Health check completed in {:?}: {}", start.elapsed(), result.status);

        if result.status == HealthStatus::Unhealthy {
            self.failure_count.fetch_add(1, Ordering::SeqCst);
            warn!("Health check failed: {:?}", result.message);
        }

        *self.last_check.write().await = Some(result.clone());
        result
    }

    /// Get the last health check result.
    pub async fn last_result(&self) -> Option<HealthCheckResult> {
        self.last_check.read().await.clone()
    }

    /// Get the total number of health checks performed.
    pub fn check_count(&self) -> u64 {
        self.check_count.load(Ordering::SeqCst)
    }

    /// Get the number of failed health checks.
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::SeqCst)
    }

    /// Run the periodic health check loop until `shutdown` is cancelled.
    pub async fn start_loop(self: Arc<Self>, shutdown: CancellationToken) {
        info!("Starting health check loop (interval: {:?})", self.interval);

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    let result = self.check().await;
                    if result.status == HealthStatus::Unhealthy {
                        error!("Process health check failed");
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Health check loop shutting down");
                    break;
                }
            }
        }
    }
}

/// Simple liveness check that always returns healthy.
pub struct LivenessCheck;

impl HealthCheckable for LivenessCheck {
    fn name(&self) -> &str {
        "liveness"
    }

    fn check_health(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ComponentCheck> + Send + '_>> {
        Box::pin(async {
            ComponentCheck::new("liveness", HealthStatus::Healthy).with_details("Process is alive")
        })
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
