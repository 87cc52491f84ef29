//! Delivery lifecycle: start the selected mode, fall back, shut down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use aide_config::DeliveryConfig;
use aide_protocols::{DeliveryError, DeliveryMode, UpdateHandler, UpdateSource};

use crate::consumer::PullConsumer;
use crate::registrar::PushRegistrar;
use crate::selector;
use crate::status::{DeliverySnapshot, DeliveryStatus};

type PullOutcome = Result<(), DeliveryError>;

/// Owns the delivery subsystem for one process run.
///
/// Built once at startup and shared behind an `Arc`. Push and pull are never
/// active together: the pull loop only starts once any push endpoint has
/// been cleared, and a fallback disables push for the rest of the run.
pub struct LifecycleController {
    source: Arc<dyn UpdateSource>,
    handler: Arc<dyn UpdateHandler>,
    config: DeliveryConfig,
    status: Arc<DeliveryStatus>,
    registrar: PushRegistrar,
    shutdown: CancellationToken,
    started: AtomicBool,
    push_disabled: AtomicBool,
    pull_task: Mutex<Option<JoinHandle<PullOutcome>>>,
    exit: Arc<watch::Sender<Option<PullOutcome>>>,
}

impl LifecycleController {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        handler: Arc<dyn UpdateHandler>,
        config: DeliveryConfig,
    ) -> Self {
        Self::with_status(source, handler, config, Arc::new(DeliveryStatus::new()))
    }

    /// Build with a status record shared with other components.
    pub fn with_status(
        source: Arc<dyn UpdateSource>,
        handler: Arc<dyn UpdateHandler>,
        config: DeliveryConfig,
        status: Arc<DeliveryStatus>,
    ) -> Self {
        let registrar = PushRegistrar::new(source.clone(), handler.clone(), status.clone(), &config);
        let (exit, _) = watch::channel(None);

        Self {
            source,
            handler,
            config,
            status,
            registrar,
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
            push_disabled: AtomicBool::new(false),
            pull_task: Mutex::new(None),
            exit: Arc::new(exit),
        }
    }

    /// Stop delivery when `parent` is cancelled, e.g. by a shutdown signal.
    pub fn with_shutdown(mut self, parent: &CancellationToken) -> Self {
        self.shutdown = parent.child_token();
        self
    }

    pub fn status(&self) -> Arc<DeliveryStatus> {
        self.status.clone()
    }

    pub fn snapshot(&self) -> DeliverySnapshot {
        self.status.snapshot()
    }

    pub fn mode(&self) -> Option<DeliveryMode> {
        self.status.mode()
    }

    /// Start delivery in the selected mode.
    ///
    /// A failed push registration falls back to pulling, except when the
    /// credentials were rejected: that error is returned and nothing runs.
    /// Once delivery has stopped, by [`LifecycleController::stop`] or on its
    /// own, it cannot be started again.
    pub async fn start(&self) -> Result<DeliveryMode, DeliveryError> {
        if self.shutdown.is_cancelled() || self.status.stopped_reason().is_some() {
            return Err(DeliveryError::Configuration(
                "delivery already stopped".to_string(),
            ));
        }
        if self.started.swap(true, Ordering::SeqCst) {
            let mode = self.status.mode().unwrap_or(DeliveryMode::Pull);
            warn!(%mode, "Delivery already started");
            return Ok(mode);
        }

        let selection = selector::select(&self.config);
        match (selection.mode, selection.callback_url) {
            (DeliveryMode::Push, Some(url)) if !self.push_disabled.load(Ordering::SeqCst) => {
                self.start_push(&url).await
            }
            _ => {
                self.clear_push_for_pull().await?;
                self.start_pull().await;
                Ok(DeliveryMode::Pull)
            }
        }
    }

    async fn start_push(&self, url: &str) -> Result<DeliveryMode, DeliveryError> {
        let result = self.registrar.register(url, &self.shutdown).await;
        if result.success {
            self.status.set_mode(DeliveryMode::Push);
            info!(url, buffered = result.buffered_count, "Delivering via push");
            return Ok(DeliveryMode::Push);
        }

        let error = result
            .error
            .unwrap_or_else(|| DeliveryError::Transient("push registration failed".to_string()));

        if matches!(error, DeliveryError::Fatal(_)) {
            error!("Push registration failed fatally: {}", error);
            self.status.mark_stopped(error.to_string());
            return Err(error);
        }
        if self.shutdown.is_cancelled() {
            return Err(error);
        }

        warn!("Push registration failed ({}), falling back to long-polling", error);
        self.push_disabled.store(true, Ordering::SeqCst);
        self.clear_push_for_pull().await?;
        self.start_pull().await;
        Ok(DeliveryMode::Pull)
    }

    /// The platform refuses long-polling while a push endpoint is set, so the
    /// pull loop only starts once the endpoint is confirmed gone.
    async fn clear_push_for_pull(&self) -> Result<(), DeliveryError> {
        match self.registrar.clear_until_done(false, &self.shutdown).await {
            Ok(_) => Ok(()),
            Err(e) if self.shutdown.is_cancelled() => Err(e),
            Err(e) => {
                error!("Cannot clear push endpoint, long-polling impossible: {}", e);
                self.status.mark_stopped(e.to_string());
                Err(e)
            }
        }
    }

    async fn start_pull(&self) {
        let consumer = PullConsumer::new(
            self.source.clone(),
            self.handler.clone(),
            self.status.clone(),
            &self.config,
        )
        .with_offset(self.status.offset());

        self.status.set_mode(DeliveryMode::Pull);
        let token = self.shutdown.child_token();
        let exit = self.exit.clone();

        let handle = tokio::spawn(async move {
            let outcome = consumer.run(token).await.map(|_| ());
            exit.send_replace(Some(outcome.clone()));
            outcome
        });
        *self.pull_task.lock().await = Some(handle);
        info!("Delivering via long-polling");
    }

    /// Resolves when delivery ends: the pull loop exited on its own, or
    /// [`LifecycleController::stop`] completed.
    pub async fn wait(&self) -> Result<(), DeliveryError> {
        let mut rx = self.exit.subscribe();
        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| DeliveryError::Transient("delivery controller dropped".to_string()))?;
        outcome.clone().unwrap_or(Ok(()))
    }

    /// Stop delivery.
    ///
    /// A running pull loop is signalled and awaited (at most one in-flight
    /// fetch); an active push endpoint is cleared along with anything the
    /// platform still buffers for it.
    pub async fn stop(&self) -> Result<(), DeliveryError> {
        info!("Stopping delivery");
        self.shutdown.cancel();

        let task = self.pull_task.lock().await.take();
        if let Some(handle) = task {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Pull consumer had already stopped: {}", e),
                Err(e) => error!("Pull consumer task failed: {}", e),
            }
        }

        let mut result = Ok(());
        if self.status.registration().is_some() {
            if let Err(e) = self.registrar.clear(true).await {
                warn!("Could not clear push endpoint on shutdown: {}", e);
                result = Err(e);
            }
        }

        self.exit.send_if_modified(|outcome| {
            if outcome.is_none() {
                *outcome = Some(Ok(()));
                true
            } else {
                false
            }
        });
        info!("Delivery stopped");
        result
    }

    /// Whether push was abandoned for this run.
    pub fn is_push_disabled(&self) -> bool {
        self.push_disabled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
