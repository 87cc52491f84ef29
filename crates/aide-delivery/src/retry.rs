//! Retry policy for registration and polling.

use std::time::Duration;

use aide_config::DeliveryConfig;

/// Retry configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts allowed, `None` for unbounded.
    pub max_attempts: Option<u32>,
    /// Delay after the first failure.
    pub base_delay: Duration,
    /// Ceiling for any computed delay.
    pub max_delay: Duration,
    /// Growth factor per failed attempt; 1.0 keeps the delay fixed.
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Bounded, fixed-spacing policy for push registration.
    pub fn registration(config: &DeliveryConfig) -> Self {
        Self {
            max_attempts: Some(config.registration_attempts.max(1)),
            base_delay: config.registration_spacing(),
            max_delay: config.registration_spacing(),
            backoff_multiplier: 1.0,
        }
    }

    /// Unbounded, fixed-delay policy for the pull loop.
    pub fn polling(config: &DeliveryConfig) -> Self {
        Self {
            max_attempts: None,
            base_delay: config.retry_delay(),
            max_delay: config.retry_delay(),
            backoff_multiplier: 1.0,
        }
    }

    /// Grow the delay geometrically up to `max_delay`.
    pub fn with_backoff(mut self, multiplier: f64, max_delay: Duration) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self.max_delay = max_delay.max(self.base_delay);
        self
    }

    /// Calculate the delay after failed attempt number `attempt` (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(32) as i32;
        let delay = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let delay = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(delay)
    }

    /// Delay for `attempt`, stretched to honour a longer server-provided delay.
    pub fn delay_with_hint(&self, attempt: u32, server_delay: Option<Duration>) -> Duration {
        let policy_delay = self.delay_for_attempt(attempt);
        server_delay.map_or(policy_delay, |hint| hint.max(policy_delay))
    }

    /// Whether another attempt is allowed after `failures` failed ones.
    pub fn allows(&self, failures: u32) -> bool {
        self.max_attempts.is_none_or(|max| failures < max)
    }
}

/// Per-loop retry bookkeeping: attempt count and next delay.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    failures: u32,
    next_delay: Option<Duration>,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure. Returns the delay before the next attempt, or `None`
    /// once the policy's attempt budget is spent.
    pub fn record_failure(
        &mut self,
        policy: &RetryPolicy,
        server_delay: Option<Duration>,
    ) -> Option<Duration> {
        let attempt = self.failures;
        self.failures = self.failures.saturating_add(1);

        if !policy.allows(self.failures) {
            self.next_delay = None;
            return None;
        }

        let delay = policy.delay_with_hint(attempt, server_delay);
        self.next_delay = Some(delay);
        Some(delay)
    }

    /// Reset after a successful call.
    pub fn reset(&mut self) {
        self.failures = 0;
        self.next_delay = None;
    }

    /// Failures since the last reset.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn next_delay(&self) -> Option<Duration> {
        self.next_delay
    }
}
