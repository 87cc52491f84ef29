//! Update handler errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Invalid update payload: {0}")]
    InvalidPayload(String),

    #[error("Handler failed: {0}")]
    Failed(String),

    #[error("Handler unavailable")]
    Unavailable,
}
