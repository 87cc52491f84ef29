//! Long-polling consumer loop.
//!
//! Fetches batches starting at the acknowledgment offset, dispatches them in
//! order, then commits `highest id + 1`. The next fetch carries the new
//! offset, which is what acknowledges the batch upstream.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use aide_config::DeliveryConfig;
use aide_protocols::{DeliveryError, InboundEvent, SourceError, UpdateHandler, UpdateSource};

use crate::dispatch::dispatch;
use crate::retry::{RetryPolicy, RetryState};
use crate::status::DeliveryStatus;

/// The pull consumer. Owns the offset; nothing else mutates it.
pub struct PullConsumer {
    source: Arc<dyn UpdateSource>,
    handler: Arc<dyn UpdateHandler>,
    status: Arc<DeliveryStatus>,
    poll_timeout: Duration,
    policy: RetryPolicy,
    offset: i64,
    /// Offset carried by the most recent fetch, i.e. what upstream has seen acknowledged.
    acknowledged: i64,
}

impl PullConsumer {
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
            poll_timeout: config.poll_timeout(),
            policy: RetryPolicy::polling(config),
            offset: 0,
            acknowledged: 0,
        }
    }

    /// Resume from a known offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset.max(0);
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Next unseen sequence id.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Run until `shutdown` is cancelled or a terminal error occurs.
    ///
    /// Returns the final offset on a clean stop. An in-flight fetch is
    /// allowed to finish; only the retry sleep is interrupted.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<i64, DeliveryError> {
        info!(offset = self.offset, timeout = ?self.poll_timeout, "Pull consumer started");
        self.status.set_pull_running(true);

        let result = self.poll_until_stopped(&shutdown).await;

        if result.is_ok() {
            self.acknowledge().await;
        }
        self.status.set_pull_running(false);

        match result {
            Ok(()) => {
                info!(offset = self.offset, "Pull consumer stopped");
                Ok(self.offset)
            }
            Err(e) => {
                self.status.mark_stopped(e.to_string());
                Err(e)
            }
        }
    }

    async fn poll_until_stopped(&mut self, shutdown: &CancellationToken) -> Result<(), DeliveryError> {
        let mut retry = RetryState::new();

        loop {
            if shutdown.is_cancelled() {
                return Ok(());
            }

            self.acknowledged = self.offset;
            let err = match self.source.fetch_batch(self.offset, self.poll_timeout).await {
                Ok(events) => {
                    retry.reset();
                    self.status.record_fetch();
                    self.dispatch_batch(events).await;
                    continue;
                }
                Err(e) => e,
            };

            match err {
                SourceError::TimedOut => {
                    // Idle polls come back empty; only a dead link outlives the deadline.
                    warn!(offset = self.offset, "Long poll got no response in time, polling again");
                    self.status.record_retry();
                }
                SourceError::Unauthenticated(_) => {
                    error!("Pull consumer stopping, credentials rejected: {}", err);
                    return Err(err.into());
                }
                SourceError::Conflict(_) => {
                    error!("Pull consumer stopping, another consumer owns the stream: {}", err);
                    return Err(err.into());
                }
                SourceError::Rejected(_) => {
                    error!("Pull consumer stopping, fetch request rejected: {}", err);
                    return Err(err.into());
                }
                SourceError::Transient(_) | SourceError::Throttled { .. } => {
                    let delay = retry
                        .record_failure(&self.policy, err.retry_after())
                        .unwrap_or(self.policy.base_delay);
                    warn!(
                        offset = self.offset,
                        attempt = retry.failures(),
                        ?delay,
                        "Fetch failed, retrying: {}",
                        err
                    );
                    self.status.record_retry();

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.cancelled() => return Ok(()),
                    }
                }
            }
        }
    }

    async fn dispatch_batch(&mut self, events: Vec<InboundEvent>) {
        let mut high_water: Option<i64> = None;
        let count = events.len();

        for event in events {
            let id = event.sequence_id;
            if id < self.offset {
                debug!(sequence_id = id, offset = self.offset, "Skipping already committed event");
                continue;
            }
            dispatch(self.handler.as_ref(), &self.status, event).await;
            high_water = Some(high_water.map_or(id, |h| h.max(id)));
        }

        if let Some(high) = high_water {
            self.commit(high);
            debug!(count, offset = self.offset, "Batch committed");
        }
    }

    fn commit(&mut self, high_water: i64) {
        let next = high_water.saturating_add(1);
        if next > self.offset {
            self.offset = next;
            self.status.set_offset(next);
        }
    }

    /// Confirm the last dispatched batch upstream before exiting so it is not
    /// redelivered on the next start.
    async fn acknowledge(&mut self) {
        if self.offset <= self.acknowledged {
            return;
        }
        match self.source.fetch_batch(self.offset, Duration::ZERO).await {
            Ok(_) => {
                self.acknowledged = self.offset;
                debug!(offset = self.offset, "Final batch acknowledged");
            }
            Err(e) => warn!(offset = self.offset, "Could not acknowledge final batch: {}", e),
        }
    }
}

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;
