use tracing::{debug, warn};

use aide_protocols::{InboundEvent, UpdateHandler};

use crate::status::DeliveryStatus;

/// Hand one event to the application handler. Failures are logged and
/// counted, never propagated.
pub(crate) async fn dispatch(
    handler: &dyn UpdateHandler,
    status: &DeliveryStatus,
    event: InboundEvent,
) -> bool {
    let sequence_id = event.sequence_id;
    let via = event.received_via;

    match handler.handle(event).await {
        Ok(()) => {
            status.record_dispatch();
            debug!(sequence_id, %via, "Event dispatched");
            true
        }
        Err(e) => {
            status.record_handler_failure();
            warn!(sequence_id, %via, "Update handler failed: {}", e);
            false
        }
    }
}
