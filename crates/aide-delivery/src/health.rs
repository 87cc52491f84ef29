//! Delivery health reporting.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::warn;

use aide_protocols::health::{ComponentCheck, HealthCheckable, HealthStatus};
use aide_protocols::{DeliveryMode, PushRegistration, UpdateSource};

use crate::status::DeliveryStatus;

/// Poll windows without a successful fetch before the loop counts as stalled.
const STALE_WINDOWS: u32 = 3;

/// Reports delivery health from [`DeliveryStatus`].
///
/// Unhealthy once the subsystem stopped on its own; degraded while the pull
/// loop has gone more than three poll windows without a successful fetch.
///
/// With a source attached, push mode also asks the platform for its view of
/// the endpoint: delivery errors recorded since registration, or a URL that
/// no longer matches, report degraded.
pub struct DeliveryHealthCheck {
    status: Arc<DeliveryStatus>,
    stale_after: Duration,
    source: Option<Arc<dyn UpdateSource>>,
}

impl DeliveryHealthCheck {
    pub fn new(status: Arc<DeliveryStatus>, poll_timeout: Duration) -> Self {
        let window = poll_timeout.max(Duration::from_secs(1));
        Self {
            status,
            stale_after: window * STALE_WINDOWS,
            source: None,
        }
    }

    /// Query the platform's push status on every push-mode check.
    pub fn with_source(mut self, source: Arc<dyn UpdateSource>) -> Self {
        self.source = Some(source);
        self
    }

    async fn evaluate(&self) -> ComponentCheck {
        if let Some(reason) = self.status.stopped_reason() {
            return ComponentCheck::new(self.name(), HealthStatus::Unhealthy)
                .with_details(format!("stopped: {}", reason));
        }

        match self.status.mode() {
            None => ComponentCheck::new(self.name(), HealthStatus::Healthy).with_details("starting"),
            Some(DeliveryMode::Push) => match self.status.registration() {
                Some(registration) => self.evaluate_push(&registration).await,
                None => ComponentCheck::new(self.name(), HealthStatus::Healthy)
                    .with_details("push endpoint not registered"),
            },
            Some(DeliveryMode::Pull) => self.evaluate_pull(),
        }
    }

    async fn evaluate_push(&self, registration: &PushRegistration) -> ComponentCheck {
        let healthy = || {
            ComponentCheck::new(self.name(), HealthStatus::Healthy)
                .with_details(format!("push via {}", registration.url))
        };
        let Some(source) = &self.source else {
            return healthy();
        };

        let remote = match source.query_push_status().await {
            Ok(remote) => remote,
            Err(e) => {
                warn!("Could not query push endpoint status: {}", e);
                return ComponentCheck::new(self.name(), HealthStatus::Degraded)
                    .with_details(format!("push status unavailable: {}", e));
            }
        };

        if remote.url != registration.url {
            warn!(
                expected = %registration.url,
                actual = %remote.url,
                "Platform no longer reports our push endpoint"
            );
            return ComponentCheck::new(self.name(), HealthStatus::Degraded).with_details(format!(
                "push endpoint is '{}', expected '{}'",
                remote.url, registration.url
            ));
        }

        if let Some(message) = &remote.last_error_message {
            // Errors from before our registration belong to an earlier endpoint.
            let recent = remote
                .last_error_at
                .is_none_or(|at| at >= registration.registered_at);
            if recent {
                warn!(
                    last_error_at = ?remote.last_error_at,
                    pending = remote.pending_count,
                    "Platform reports push delivery errors: {}", message
                );
                return ComponentCheck::new(self.name(), HealthStatus::Degraded).with_details(
                    format!(
                        "push delivery failing: {} ({} pending)",
                        message, remote.pending_count
                    ),
                );
            }
        }

        healthy()
    }

    fn evaluate_pull(&self) -> ComponentCheck {
        if !self.status.is_pull_running() {
            return ComponentCheck::new(self.name(), HealthStatus::Degraded)
                .with_details("pull consumer not running");
        }

        let offset = self.status.offset();
        let Some(last_activity) = self.status.last_pull_activity() else {
            return ComponentCheck::new(self.name(), HealthStatus::Healthy)
                .with_details(format!("pull at offset {}", offset));
        };

        let idle = (Utc::now() - last_activity).to_std().unwrap_or_default();
        if idle > self.stale_after {
            ComponentCheck::new(self.name(), HealthStatus::Degraded).with_details(format!(
                "no successful fetch for {}s (offset {})",
                idle.as_secs(),
                offset
            ))
        } else {
            ComponentCheck::new(self.name(), HealthStatus::Healthy)
                .with_details(format!("pull at offset {}", offset))
        }
    }
}

impl HealthCheckable for DeliveryHealthCheck {
    fn name(&self) -> &str {
        "delivery"
    }

    fn check_health(&self) -> Pin<Box<dyn Future<Output = ComponentCheck> + Send + '_>> {
        Box::pin(async move { self.evaluate().await })
    }
}
