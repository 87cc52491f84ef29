//! # Aide Delivery
//!
//! Gets every chat-platform event to the application handler, whether the
//! platform pushes it to our webhook or we long-poll for it.
//!
//! ## Components
//!
//! - [`selector`] - decides push vs pull from configuration alone
//! - [`PushRegistrar`] - registers, verifies and clears the push endpoint
//! - [`PullConsumer`] - the long-polling loop and its acknowledgment offset
//! - [`LifecycleController`] - starts the selected mode, falls back, shuts down
//! - [`DedupHandler`] - skips replays of recently seen sequence ids
//! - [`webhook`] - inbound push and status routes

pub mod consumer;
pub mod dedup;
mod dispatch;
pub mod health;
pub mod lifecycle;
pub mod registrar;
pub mod retry;
pub mod selector;
pub mod status;
pub mod webhook;

#[cfg(test)]
mod testing;

pub use consumer::PullConsumer;
pub use dedup::DedupHandler;
pub use health::DeliveryHealthCheck;
pub use lifecycle::LifecycleController;
pub use registrar::{PushRegistrar, RegistrationResult};
pub use retry::{RetryPolicy, RetryState};
pub use selector::{ModeSelection, TargetError};
pub use status::{DeliverySnapshot, DeliveryStatus};
pub use webhook::{WebhookState, status_router, webhook_router};
