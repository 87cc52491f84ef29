//! Telegram Bot API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use aide_config::TelegramConfig;
use aide_protocols::delivery::{
    DeliveryMode, InboundEvent, PushRequest, PushStatus, UpdateSource,
};
use aide_protocols::error::SourceError;

use crate::api::{
    ApiResponse, DeleteWebhookRequest, EmptyRequest, GetUpdatesRequest, SetWebhookRequest,
    WebhookInfo,
};

const UPDATE_ID_FIELD: &str = "update_id";
const MAX_POLL_LIMIT: u32 = 100;

/// Bot API client implementing [`UpdateSource`].
///
/// Performs exactly one HTTP call per operation; classification into
/// [`SourceError`] happens here, retry decisions do not.
pub struct TelegramClient {
    client: Client,
    method_base: String,
    request_timeout: Duration,
    poll_limit: u32,
    allowed_updates: Vec<String>,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .build()
            .map_err(|e| SourceError::Rejected(format!("HTTP client: {}", e.without_url())))?;

        Ok(Self {
            client,
            method_base: format!(
                "{}/bot{}",
                config.api_base.trim_end_matches('/'),
                config.token
            ),
            request_timeout: config.request_timeout(),
            poll_limit: MAX_POLL_LIMIT,
            allowed_updates: Vec::new(),
        })
    }

    /// Maximum events returned by one `getUpdates` call (1..=100).
    pub fn with_poll_limit(mut self, limit: u32) -> Self {
        self.poll_limit = limit.clamp(1, MAX_POLL_LIMIT);
        self
    }

    /// Event types requested while polling.
    pub fn with_allowed_updates(mut self, allowed_updates: Vec<String>) -> Self {
        self.allowed_updates = allowed_updates;
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.method_base, method)
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T, SourceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let text = response.text().await.map_err(classify_transport)?;
        let envelope = serde_json::from_str::<ApiResponse<T>>(&text).ok();

        match envelope {
            Some(ApiResponse {
                ok: true,
                result: Some(result),
                ..
            }) if status.is_success() => Ok(result),
            Some(envelope) => Err(classify_api(
                status,
                envelope.error_code,
                envelope.description.unwrap_or_default(),
                envelope.parameters.and_then(|p| p.retry_after),
            )),
            None => Err(classify_api(status, None, truncate(&text), None)),
        }
    }
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn register_push(&self, request: &PushRequest) -> Result<bool, SourceError> {
        let body = SetWebhookRequest {
            url: &request.url,
            max_connections: request.max_connections.clamp(1, 100),
            allowed_updates: &request.allowed_updates,
            secret_token: request.secret_token.as_deref(),
        };
        let accepted: bool = self.call("setWebhook", &body, self.request_timeout).await?;
        debug!(accepted, "setWebhook answered");
        Ok(accepted)
    }

    async fn clear_push(&self, drop_buffered: bool) -> Result<bool, SourceError> {
        let body = DeleteWebhookRequest {
            drop_pending_updates: drop_buffered,
        };
        let cleared: bool = self.call("deleteWebhook", &body, self.request_timeout).await?;
        debug!(cleared, drop_buffered, "deleteWebhook answered");
        Ok(cleared)
    }

    async fn fetch_batch(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<Vec<InboundEvent>, SourceError> {
        let body = GetUpdatesRequest {
            offset,
            timeout: timeout.as_secs(),
            limit: self.poll_limit,
            allowed_updates: &self.allowed_updates,
        };
        // The server ends an idle poll; the client deadline only catches a dead link.
        let deadline = timeout + self.request_timeout;
        let updates: Vec<Value> = self.call("getUpdates", &body, deadline).await?;

        let mut events = Vec::with_capacity(updates.len());
        for update in updates {
            match InboundEvent::from_update(update, UPDATE_ID_FIELD, DeliveryMode::Pull) {
                Ok(event) => events.push(event),
                Err(e) => warn!("Skipping update without id: {}", e),
            }
        }
        Ok(events)
    }

    async fn query_push_status(&self) -> Result<PushStatus, SourceError> {
        let info: WebhookInfo = self
            .call("getWebhookInfo", &EmptyRequest {}, self.request_timeout)
            .await?;
        Ok(info.into())
    }
}

/// Map a failed send/receive to a [`SourceError`]. The URL carries the bot
/// token, so it is stripped before the error is formatted.
fn classify_transport(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        return SourceError::TimedOut;
    }
    SourceError::Transient(err.without_url().to_string())
}

/// Map a Bot API error response to a [`SourceError`].
///
/// The envelope's `error_code` wins over the HTTP status when present.
fn classify_api(
    status: StatusCode,
    error_code: Option<u16>,
    description: String,
    retry_after: Option<u64>,
) -> SourceError {
    let code = error_code.unwrap_or(status.as_u16());
    match code {
        401 | 403 | 404 => SourceError::Unauthenticated(description),
        409 => SourceError::Conflict(description),
        429 => SourceError::Throttled {
            retry_after: Duration::from_secs(retry_after.unwrap_or(1)),
        },
        400..=499 => SourceError::Rejected(description),
        _ => SourceError::Transient(format!("HTTP {}: {}", code, description)),
    }
}

fn truncate(text: &str) -> String {
    const MAX: usize = 200;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
