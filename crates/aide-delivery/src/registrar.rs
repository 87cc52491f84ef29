//! Push endpoint registration.
//!
//! Registers the callback URL with the platform, verifies the platform saw
//! the same URL, then drains anything buffered while no consumer was active.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use aide_config::DeliveryConfig;
use aide_protocols::{
    DeliveryError, PushRegistration, PushRequest, PushStatus, SourceError, UpdateHandler,
    UpdateSource,
};

use crate::dispatch::dispatch;
use crate::retry::{RetryPolicy, RetryState};
use crate::selector::validate_target;
use crate::status::DeliveryStatus;

/// Outcome of [`PushRegistrar::register`].
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationResult {
    pub success: bool,
    /// Events the platform had buffered when registration was verified.
    pub buffered_count: u32,
    pub error: Option<DeliveryError>,
}

impl RegistrationResult {
    fn registered(buffered_count: u32) -> Self {
        Self {
            success: true,
            buffered_count,
            error: None,
        }
    }

    fn failed(error: DeliveryError) -> Self {
        Self {
            success: false,
            buffered_count: 0,
            error: Some(error),
        }
    }

    /// Whether the failure must stop the subsystem instead of falling back.
    pub fn is_fatal(&self) -> bool {
        matches!(self.error, Some(DeliveryError::Fatal(_)))
    }
}

/// Why a single registration attempt did not stick.
#[derive(Debug)]
enum AttemptError {
    Source(SourceError),
    NotAccepted,
    Mismatch { expected: String, actual: String },
}

impl AttemptError {
    fn is_retryable(&self) -> bool {
        match self {
            AttemptError::Source(e) => e.is_retryable(),
            AttemptError::NotAccepted | AttemptError::Mismatch { .. } => true,
        }
    }

    fn server_delay(&self) -> Option<Duration> {
        match self {
            AttemptError::Source(e) => e.retry_after(),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptError::Source(e) => write!(f, "{}", e),
            AttemptError::NotAccepted => write!(f, "platform did not accept the push endpoint"),
            AttemptError::Mismatch { expected, actual } => {
                write!(f, "platform reports '{}' instead of '{}'", actual, expected)
            }
        }
    }
}

impl From<AttemptError> for DeliveryError {
    fn from(err: AttemptError) -> Self {
        match err {
            AttemptError::Source(e) => e.into(),
            other => DeliveryError::Transient(other.to_string()),
        }
    }
}

/// Registers, verifies and clears the push endpoint.
pub struct PushRegistrar {
    source: Arc<dyn UpdateSource>,
    handler: Arc<dyn UpdateHandler>,
    status: Arc<DeliveryStatus>,
    policy: RetryPolicy,
    max_connections: u32,
    allowed_updates: Vec<String>,
    secret_token: Option<String>,
}

impl PushRegistrar {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        handler: Arc<dyn UpdateHandler>,
        status: Arc<DeliveryStatus>,
        config: &DeliveryConfig,
    ) -> Self {
        Self {
            source,
            handler,
            status,
            policy: RetryPolicy::registration(config),
            max_connections: config.max_connections,
            allowed_updates: config.allowed_updates.clone(),
            secret_token: config.secret_token.clone().filter(|s| !s.is_empty()),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Register `url` as the push endpoint.
    ///
    /// Retries transient failures under the registration policy; a failed
    /// result means the caller should fall back to pulling, unless
    /// [`RegistrationResult::is_fatal`] says otherwise.
    pub async fn register(&self, url: &str, shutdown: &CancellationToken) -> RegistrationResult {
        if let Err(e) = validate_target(url) {
            warn!("Refusing to register push endpoint: {}", e);
            return RegistrationResult::failed(DeliveryError::Configuration(e.to_string()));
        }

        let request = PushRequest {
            url: url.to_string(),
            max_connections: self.max_connections.clamp(1, 100),
            allowed_updates: self.allowed_updates.clone(),
            secret_token: self.secret_token.clone(),
        };

        let mut state = RetryState::new();
        loop {
            if shutdown.is_cancelled() {
                return RegistrationResult::failed(DeliveryError::Transient(
                    "registration interrupted by shutdown".to_string(),
                ));
            }

            let attempt = state.failures() + 1;
            let err = match self.attempt(&request).await {
                Ok(push_status) => return self.complete(url, push_status).await,
                Err(e) => e,
            };

            if !err.is_retryable() {
                let err = DeliveryError::from(err);
                error!(attempt, "Push registration aborted: {}", err);
                return RegistrationResult::failed(err);
            }

            let Some(delay) = state.record_failure(&self.policy, err.server_delay()) else {
                warn!(attempt, "Push registration failed, no attempts left: {}", err);
                return RegistrationResult::failed(err.into());
            };

            warn!(attempt, ?delay, "Push registration attempt failed: {}", err);
            self.status.record_retry();

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => {
                    return RegistrationResult::failed(DeliveryError::Transient(
                        "registration interrupted by shutdown".to_string(),
                    ));
                }
            }
        }
    }

    async fn attempt(&self, request: &PushRequest) -> Result<PushStatus, AttemptError> {
        let accepted = self
            .source
            .register_push(request)
            .await
            .map_err(AttemptError::Source)?;
        if !accepted {
            return Err(AttemptError::NotAccepted);
        }

        let status = self
            .source
            .query_push_status()
            .await
            .map_err(AttemptError::Source)?;
        if status.url != request.url {
            return Err(AttemptError::Mismatch {
                expected: request.url.clone(),
                actual: status.url,
            });
        }
        Ok(status)
    }

    async fn complete(&self, url: &str, push_status: PushStatus) -> RegistrationResult {
        if let Some(message) = &push_status.last_error_message {
            warn!(
                last_error_at = ?push_status.last_error_at,
                "Platform reports a previous push delivery error: {}", message
            );
        }

        let buffered = push_status.pending_count;
        self.status.set_registration(PushRegistration {
            url: url.to_string(),
            registered_at: Utc::now(),
            buffered_count: buffered,
        });
        info!(url, buffered, "Push endpoint registered");

        if buffered > 0 {
            self.drain().await;
        }
        RegistrationResult::registered(buffered)
    }

    /// Consume and acknowledge events buffered before registration.
    ///
    /// Failures are logged only; the registration stands either way.
    pub async fn drain(&self) -> usize {
        let events = match self.source.fetch_batch(0, Duration::ZERO).await {
            Ok(events) => events,
            Err(e) => {
                warn!("Could not drain buffered events: {}", e);
                return 0;
            }
        };

        let Some(last) = events.iter().map(|e| e.sequence_id).max() else {
            debug!("Nothing buffered to drain");
            return 0;
        };

        let count = events.len();
        for event in events {
            dispatch(self.handler.as_ref(), &self.status, event).await;
        }

        match self.source.fetch_batch(last + 1, Duration::ZERO).await {
            Ok(_) => info!(count, last, "Drained buffered events"),
            Err(e) => warn!(count, last, "Drained events but acknowledgment failed: {}", e),
        }
        count
    }

    /// Remove the push endpoint.
    pub async fn clear(&self, drop_buffered: bool) -> Result<bool, DeliveryError> {
        let cleared = self.source.clear_push(drop_buffered).await?;
        self.forget_registration(drop_buffered);
        Ok(cleared)
    }

    /// Remove the push endpoint, retrying until the platform confirms.
    ///
    /// Long-polling is refused upstream while an endpoint is set, so transient
    /// failures are retried at the registration spacing with no attempt
    /// limit. Returns early on a non-retryable error or on shutdown.
    pub async fn clear_until_done(
        &self,
        drop_buffered: bool,
        shutdown: &CancellationToken,
    ) -> Result<bool, DeliveryError> {
        let policy = RetryPolicy {
            max_attempts: None,
            ..self.policy.clone()
        };
        let mut state = RetryState::new();

        loop {
            let err = match self.source.clear_push(drop_buffered).await {
                Ok(cleared) => {
                    self.forget_registration(drop_buffered);
                    return Ok(cleared);
                }
                Err(e) => e,
            };

            if !err.is_retryable() {
                return Err(err.into());
            }

            let delay = state
                .record_failure(&policy, err.retry_after())
                .unwrap_or(policy.base_delay);
            warn!(
                attempt = state.failures(),
                ?delay,
                "Could not clear push endpoint, retrying: {}",
                err
            );
            self.status.record_retry();

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => {
                    return Err(DeliveryError::Transient(
                        "clearing push endpoint interrupted by shutdown".to_string(),
                    ));
                }
            }
        }
    }

    fn forget_registration(&self, drop_buffered: bool) {
        if let Some(registration) = self.status.clear_registration() {
            info!(url = %registration.url, drop_buffered, "Push endpoint cleared");
        } else {
            debug!(drop_buffered, "Stale push endpoint cleared");
        }
    }
}

#[cfg(test)]
#[path = "registrar_tests.rs"]
mod tests;
