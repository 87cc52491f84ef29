//! Shared delivery status.
//!
//! Written by the delivery components, read by health checks and the
//! `/status` route.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use aide_protocols::{DeliveryMode, PushRegistration};

/// Live delivery state. Counters are atomics; timestamps and the registration
/// sit behind short-lived locks.
#[derive(Debug, Default)]
pub struct DeliveryStatus {
    mode: RwLock<Option<DeliveryMode>>,
    offset: AtomicI64,
    pull_running: AtomicBool,
    registration: RwLock<Option<PushRegistration>>,
    pull_started_at: RwLock<Option<DateTime<Utc>>>,
    last_fetch_at: RwLock<Option<DateTime<Utc>>>,
    last_registration_at: RwLock<Option<DateTime<Utc>>>,
    last_push_at: RwLock<Option<DateTime<Utc>>>,
    events_dispatched: AtomicU64,
    retries: AtomicU64,
    handler_failures: AtomicU64,
    duplicates_skipped: AtomicU64,
    stopped: RwLock<Option<String>>,
}

/// Point-in-time copy of [`DeliveryStatus`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliverySnapshot {
    pub mode: Option<DeliveryMode>,
    pub offset: i64,
    pub pull_running: bool,
    pub registration: Option<PushRegistration>,
    pub pull_started_at: Option<DateTime<Utc>>,
    pub last_fetch_at: Option<DateTime<Utc>>,
    pub last_registration_at: Option<DateTime<Utc>>,
    pub last_push_at: Option<DateTime<Utc>>,
    pub events_dispatched: u64,
    pub retries: u64,
    pub handler_failures: u64,
    pub duplicates_skipped: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped_reason: Option<String>,
}

impl DeliveryStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Option<DeliveryMode> {
        *self.mode.read()
    }

    pub fn set_mode(&self, mode: DeliveryMode) {
        *self.mode.write() = Some(mode);
    }

    pub fn offset(&self) -> i64 {
        self.offset.load(Ordering::SeqCst)
    }

    /// Publish the consumer offset. Lower values are ignored.
    pub fn set_offset(&self, offset: i64) {
        self.offset.fetch_max(offset, Ordering::SeqCst);
    }

    pub fn is_pull_running(&self) -> bool {
        self.pull_running.load(Ordering::SeqCst)
    }

    pub fn set_pull_running(&self, running: bool) {
        self.pull_running.store(running, Ordering::SeqCst);
        if running {
            *self.pull_started_at.write() = Some(Utc::now());
        }
    }

    pub fn registration(&self) -> Option<PushRegistration> {
        self.registration.read().clone()
    }

    pub fn set_registration(&self, registration: PushRegistration) {
        *self.last_registration_at.write() = Some(registration.registered_at);
        *self.registration.write() = Some(registration);
    }

    pub fn clear_registration(&self) -> Option<PushRegistration> {
        self.registration.write().take()
    }

    pub fn record_fetch(&self) {
        *self.last_fetch_at.write() = Some(Utc::now());
    }

    pub fn record_push(&self) {
        *self.last_push_at.write() = Some(Utc::now());
    }

    pub fn record_dispatch(&self) {
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handler_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark the subsystem as stopped on its own. The first reason sticks.
    pub fn mark_stopped(&self, reason: impl Into<String>) {
        let mut stopped = self.stopped.write();
        if stopped.is_none() {
            *stopped = Some(reason.into());
        }
    }

    pub fn stopped_reason(&self) -> Option<String> {
        self.stopped.read().clone()
    }

    /// When the pull loop last proved it was alive: the last successful
    /// fetch, or its start time if it has not fetched yet.
    pub fn last_pull_activity(&self) -> Option<DateTime<Utc>> {
        let fetched = *self.last_fetch_at.read();
        fetched.or(*self.pull_started_at.read())
    }

    pub fn snapshot(&self) -> DeliverySnapshot {
        DeliverySnapshot {
            mode: self.mode(),
            offset: self.offset(),
            pull_running: self.is_pull_running(),
            registration: self.registration(),
            pull_started_at: *self.pull_started_at.read(),
            last_fetch_at: *self.last_fetch_at.read(),
            last_registration_at: *self.last_registration_at.read(),
            last_push_at: *self.last_push_at.read(),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            duplicates_skipped: self.duplicates_skipped.load(Ordering::Relaxed),
            stopped_reason: self.stopped_reason(),
        }
    }
}
