//! Replay guard for the application handler.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use aide_protocols::{HandlerError, InboundEvent, UpdateHandler};

use crate::status::DeliveryStatus;

#[derive(Default)]
struct SeenWindow {
    ids: HashSet<i64>,
    order: VecDeque<i64>,
}

/// Wraps an [`UpdateHandler`] and drops sequence ids already handled within
/// the last `window` events.
///
/// An id whose handling failed is forgotten, so a replay gets another chance.
pub struct DedupHandler {
    inner: Arc<dyn UpdateHandler>,
    window: usize,
    seen: Mutex<SeenWindow>,
    status: Option<Arc<DeliveryStatus>>,
}

impl DedupHandler {
    pub fn new(inner: Arc<dyn UpdateHandler>, window: usize) -> Self {
        Self {
            inner,
            window,
            seen: Mutex::new(SeenWindow::default()),
            status: None,
        }
    }

    /// Count skipped duplicates in `status`.
    pub fn with_status(mut self, status: Arc<DeliveryStatus>) -> Self {
        self.status = Some(status);
        self
    }

    /// Claim `id`. Returns false if it was already claimed.
    fn claim(&self, id: i64) -> bool {
        let mut seen = self.seen.lock();
        if !seen.ids.insert(id) {
            return false;
        }
        seen.order.push_back(id);
        while seen.order.len() > self.window {
            if let Some(evicted) = seen.order.pop_front() {
                seen.ids.remove(&evicted);
            }
        }
        true
    }

    fn release(&self, id: i64) {
        let mut seen = self.seen.lock();
        if seen.ids.remove(&id) {
            seen.order.retain(|&other| other != id);
        }
    }

    /// Number of ids currently remembered.
    pub fn remembered(&self) -> usize {
        self.seen.lock().ids.len()
    }
}

#[async_trait]
impl UpdateHandler for DedupHandler {
    async fn handle(&self, event: InboundEvent) -> Result<(), HandlerError> {
        if self.window == 0 {
            return self.inner.handle(event).await;
        }

        let id = event.sequence_id;
        if !self.claim(id) {
            debug!(sequence_id = id, via = %event.received_via, "Duplicate event skipped");
            if let Some(status) = &self.status {
                status.record_duplicate();
            }
            return Ok(());
        }

        let result = self.inner.handle(event).await;
        if result.is_err() {
            self.release(id);
        }
        result
    }
}
