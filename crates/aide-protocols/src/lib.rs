//! # Aide Protocols
//!
//! Core protocol definitions for the Aide update delivery layer.
//! Contains only interface definitions and plain data types - no implementations.
//!
//! ## Core Traits
//!
//! - [`UpdateSource`] - The upstream chat platform (push registration, long-polling)
//! - [`UpdateHandler`] - The application-level consumer of inbound events
//! - [`HealthCheckable`] - Components that report health to operators

pub mod delivery;
pub mod error;
pub mod health;

// Re-export core traits
pub use delivery::{
    DeliveryMode, InboundEvent, PushRegistration, PushRequest, PushStatus, UpdateHandler,
    UpdateSource,
};
pub use error::{DeliveryError, HandlerError, SourceError};
pub use health::{ComponentCheck, HealthCheckable, HealthStatus};
