//! Update delivery protocol definitions.
//!
//! The upstream chat platform can deliver events in two ways:
//!
//! - **Push**: the platform calls back into our HTTPS endpoint once per event.
//! - **Pull**: we long-poll the platform for batches, acknowledging with an offset.
//!
//! Both paths produce [`InboundEvent`]s and hand them to the same
//! [`UpdateHandler`], so application code never knows which mode delivered
//! an event.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HandlerError, SourceError};

#[cfg(test)]
#[path = "delivery_tests.rs"]
mod tests;

/// How inbound events reach the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// The platform calls our webhook.
    Push,
    /// We long-poll the platform.
    Pull,
}

impl DeliveryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryMode::Push => "push",
            DeliveryMode::Pull => "pull",
        }
    }
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single event from the platform.
///
/// Lives for the duration of one dispatch call; nothing persists it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Platform-assigned, strictly increasing id.
    pub sequence_id: i64,
    /// The raw decoded update.
    pub payload: Value,
    /// Which delivery path produced this event.
    pub received_via: DeliveryMode,
    /// When this process received the event.
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    /// Create an event stamped with the current time.
    pub fn new(sequence_id: i64, payload: Value, received_via: DeliveryMode) -> Self {
        Self {
            sequence_id,
            payload,
            received_via,
            received_at: Utc::now(),
        }
    }

    /// Build an event from a raw update object that carries its own id
    /// under `id_field` (e.g. `update_id`).
    pub fn from_update(
        payload: Value,
        id_field: &str,
        received_via: DeliveryMode,
    ) -> Result<Self, HandlerError> {
        let sequence_id = payload
            .get(id_field)
            .and_then(Value::as_i64)
            .ok_or_else(|| HandlerError::InvalidPayload(format!("missing integer `{}`", id_field)))?;
        Ok(Self::new(sequence_id, payload, received_via))
    }
}

/// Parameters for registering a push endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Public HTTPS URL the platform should call.
    pub url: String,
    /// Maximum simultaneous connections the platform may open (1..=100).
    pub max_connections: u32,
    /// Event types to deliver; empty means the platform default.
    #[serde(default)]
    pub allowed_updates: Vec<String>,
    /// Shared secret echoed back on every push.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<String>,
}

/// The platform's view of the push endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushStatus {
    /// Registered URL, empty when no push endpoint is set.
    pub url: String,
    /// Events buffered upstream awaiting delivery.
    pub pending_count: u32,
    /// Last delivery error the platform recorded, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_message: Option<String>,
    /// When that error happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

impl PushStatus {
    /// Whether a push endpoint is currently registered.
    pub fn is_registered(&self) -> bool {
        !self.url.is_empty()
    }
}

/// A verified push registration held by this process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRegistration {
    pub url: String,
    pub registered_at: DateTime<Utc>,
    /// Buffered-event count reported upstream right after registration.
    pub buffered_count: u32,
}

/// The upstream platform, reduced to the calls the delivery layer needs.
///
/// Implementations map every transport failure onto [`SourceError`] and
/// never retry; retry policy belongs to the caller.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Register a push endpoint. Returns the platform's confirmation.
    async fn register_push(&self, request: &PushRequest) -> Result<bool, SourceError>;

    /// Remove the push endpoint, optionally dropping buffered events.
    async fn clear_push(&self, drop_buffered: bool) -> Result<bool, SourceError>;

    /// Fetch buffered events with id >= `offset`, waiting up to `timeout`.
    ///
    /// Calling with a higher offset acknowledges everything below it.
    async fn fetch_batch(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<Vec<InboundEvent>, SourceError>;

    /// Query the current push endpoint.
    async fn query_push_status(&self) -> Result<PushStatus, SourceError>;
}

/// The application-level consumer of inbound events.
///
/// Must tolerate replays: delivery is at-least-once.
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle(&self, event: InboundEvent) -> Result<(), HandlerError>;
}
