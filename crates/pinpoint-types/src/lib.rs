//! Shared conversation types and error hierarchy for Pinpoint.

pub mod backend;
pub mod error;
pub mod message;

pub use backend::ChatBackend;
pub use error::{ApiError, ConfigError};
pub use message::*;
