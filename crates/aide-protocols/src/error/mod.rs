//! Error types for the Aide protocol layer.

mod delivery;
mod handler;
mod source;

pub use delivery::*;
pub use handler::*;
pub use source::*;
