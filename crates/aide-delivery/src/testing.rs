//! Scripted fakes shared by the delivery tests.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use aide_protocols::{
    DeliveryMode, HandlerError, InboundEvent, PushRequest, PushStatus, SourceError, UpdateHandler,
    UpdateSource,
};

/// One recorded call against [`ScriptedSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Register(String),
    Clear(bool),
    Fetch { offset: i64, timeout: Duration },
    Status,
}

pub(crate) fn event(id: i64) -> InboundEvent {
    InboundEvent::new(id, json!({ "update_id": id }), DeliveryMode::Pull)
}

/// An [`UpdateSource`] that replays scripted results and records every call.
///
/// Once a script runs dry the source behaves like a healthy, idle platform:
/// registration succeeds, status echoes the registered URL, fetches return
/// nothing after waiting out the poll window. With `idle_token` set, an
/// exhausted fetch script cancels it and returns at once instead.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    fetches: Mutex<VecDeque<Result<Vec<i64>, SourceError>>>,
    registers: Mutex<VecDeque<Result<bool, SourceError>>>,
    statuses: Mutex<VecDeque<Result<PushStatus, SourceError>>>,
    clears: Mutex<VecDeque<Result<bool, SourceError>>>,
    registered_url: Mutex<String>,
    pending: Mutex<u32>,
    idle_token: Mutex<Option<CancellationToken>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fetch(self, result: Result<Vec<i64>, SourceError>) -> Self {
        self.fetches.lock().push_back(result);
        self
    }

    pub(crate) fn register(self, result: Result<bool, SourceError>) -> Self {
        self.registers.lock().push_back(result);
        self
    }

    pub(crate) fn status(self, result: Result<PushStatus, SourceError>) -> Self {
        self.statuses.lock().push_back(result);
        self
    }

    pub(crate) fn clear(self, result: Result<bool, SourceError>) -> Self {
        self.clears.lock().push_back(result);
        self
    }

    /// Buffered-event count reported by the default status answer.
    pub(crate) fn pending(self, count: u32) -> Self {
        *self.pending.lock() = count;
        self
    }

    pub(crate) fn cancel_when_idle(self, token: CancellationToken) -> Self {
        *self.idle_token.lock() = Some(token);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub(crate) fn register_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Register(_)))
            .count()
    }

    pub(crate) fn fetch_calls(&self) -> Vec<(i64, Duration)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Fetch { offset, timeout } => Some((offset, timeout)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl UpdateSource for ScriptedSource {
    async fn register_push(&self, request: &PushRequest) -> Result<bool, SourceError> {
        self.calls.lock().push(Call::Register(request.url.clone()));
        let result = self.registers.lock().pop_front().unwrap_or(Ok(true));
        if let Ok(true) = result {
            *self.registered_url.lock() = request.url.clone();
        }
        result
    }

    async fn clear_push(&self, drop_buffered: bool) -> Result<bool, SourceError> {
        self.calls.lock().push(Call::Clear(drop_buffered));
        let result = self.clears.lock().pop_front().unwrap_or(Ok(true));
        if result.is_ok() {
            self.registered_url.lock().clear();
        }
        result
    }

    async fn fetch_batch(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<Vec<InboundEvent>, SourceError> {
        self.calls.lock().push(Call::Fetch { offset, timeout });
        let next = self.fetches.lock().pop_front();
        match next {
            Some(result) => result.map(|ids| ids.into_iter().map(event).collect()),
            None => {
                let idle_token = self.idle_token.lock().clone();
                match idle_token {
                    Some(token) => token.cancel(),
                    // An idle long poll holds the request open for the full window.
                    None => tokio::time::sleep(timeout).await,
                }
                Ok(Vec::new())
            }
        }
    }

    async fn query_push_status(&self) -> Result<PushStatus, SourceError> {
        self.calls.lock().push(Call::Status);
        let next = self.statuses.lock().pop_front();
        next.unwrap_or_else(|| {
            Ok(PushStatus {
                url: self.registered_url.lock().clone(),
                pending_count: *self.pending.lock(),
                ..Default::default()
            })
        })
    }
}

/// Records the sequence ids it sees; fails for ids in `failing`.
#[derive(Default)]
pub(crate) struct RecordingHandler {
    seen: Mutex<Vec<i64>>,
    via: Mutex<Vec<DeliveryMode>>,
    failing: HashSet<i64>,
}

impl RecordingHandler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing(ids: &[i64]) -> Self {
        Self {
            failing: ids.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub(crate) fn seen(&self) -> Vec<i64> {
        self.seen.lock().clone()
    }

    pub(crate) fn modes(&self) -> Vec<DeliveryMode> {
        self.via.lock().clone()
    }
}

#[async_trait]
impl UpdateHandler for RecordingHandler {
    async fn handle(&self, event: InboundEvent) -> Result<(), HandlerError> {
        self.seen.lock().push(event.sequence_id);
        self.via.lock().push(event.received_via);
        if self.failing.contains(&event.sequence_id) {
            return Err(HandlerError::Failed(format!("event {}", event.sequence_id)));
        }
        Ok(())
    }
}
