//! Application-side update handler.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::info;

use aide_protocols::{HandlerError, InboundEvent, UpdateHandler};

/// Logs every inbound event and fans it out to in-process subscribers.
///
/// Downstream features (intent routing, replies) subscribe here; they see
/// the same events whichever delivery mode is active.
pub(crate) struct EventFanout {
    sender: broadcast::Sender<InboundEvent>,
}

impl EventFanout {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[cfg(test)]
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<InboundEvent> {
        self.sender.subscribe()
    }
}

/// The update's kind: its first field other than `update_id`.
fn update_kind(payload: &Value) -> &str {
    payload
        .as_object()
        .and_then(|fields| fields.keys().find(|k| k.as_str() != "update_id"))
        .map(String::as_str)
        .unwrap_or("unknown")
}

#[async_trait]
impl UpdateHandler for EventFanout {
    async fn handle(&self, event: InboundEvent) -> Result<(), HandlerError> {
        if !event.payload.is_object() {
            return Err(HandlerError::InvalidPayload(
                "update is not a JSON object".to_string(),
            ));
        }

        info!(
            sequence_id = event.sequence_id,
            via = %event.received_via,
            kind = update_kind(&event.payload),
            "Update received"
        );
        // No subscribers is fine; the event has been logged.
        let _ = self.sender.send(event);
        Ok(())
    }
}
