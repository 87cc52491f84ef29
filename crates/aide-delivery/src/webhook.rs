//! Inbound push endpoint and delivery status route.
//!
//! POST {webhook_path}   - one update per call, acknowledged immediately
//! GET  /status          - current [`DeliverySnapshot`](crate::DeliverySnapshot)

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::Value;
use tracing::{debug, warn};

use aide_protocols::{DeliveryMode, InboundEvent, UpdateHandler};

use crate::dispatch::dispatch;
use crate::status::DeliveryStatus;

/// Header carrying the secret registered with the push endpoint.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

const UPDATE_ID_FIELD: &str = "update_id";

/// Shared state for the push route.
#[derive(Clone)]
pub struct WebhookState {
    handler: Arc<dyn UpdateHandler>,
    status: Arc<DeliveryStatus>,
    secret_token: Option<Arc<str>>,
}

impl WebhookState {
    pub fn new(handler: Arc<dyn UpdateHandler>, status: Arc<DeliveryStatus>) -> Self {
        Self {
            handler,
            status,
            secret_token: None,
        }
    }

    /// Require pushes to carry `secret` in [`SECRET_HEADER`]. Empty disables the check.
    pub fn with_secret(mut self, secret: Option<String>) -> Self {
        self.secret_token = secret.filter(|s| !s.is_empty()).map(Arc::from);
        self
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.secret_token else {
            return true;
        };
        headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|provided| constant_time_eq(provided.as_bytes(), expected.as_bytes()))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Router serving the push endpoint at `path`.
pub fn webhook_router(path: &str, state: WebhookState) -> Router {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    Router::new()
        .route(&path, post(receive_update))
        .with_state(state)
}

/// Router serving `GET /status`.
pub fn status_router(status: Arc<DeliveryStatus>) -> Router {
    Router::new()
        .route("/status", get(delivery_status))
        .with_state(status)
}

/// Accept one pushed update.
///
/// POST {webhook_path}
///
/// Answers before the handler runs; the platform retries anything that
/// is not acknowledged promptly.
async fn receive_update(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if !state.authorized(&headers) {
        warn!("Rejected push with missing or wrong secret token");
        return StatusCode::UNAUTHORIZED;
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Rejected malformed push body: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };
    let event = match InboundEvent::from_update(payload, UPDATE_ID_FIELD, DeliveryMode::Push) {
        Ok(event) => event,
        Err(e) => {
            warn!("Rejected push: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    state.status.record_push();
    debug!(sequence_id = event.sequence_id, "Push received");

    tokio::spawn(async move {
        dispatch(state.handler.as_ref(), &state.status, event).await;
    });
    StatusCode::OK
}

/// GET /status
async fn delivery_status(State(status): State<Arc<DeliveryStatus>>) -> impl IntoResponse {
    Json(status.snapshot())
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
