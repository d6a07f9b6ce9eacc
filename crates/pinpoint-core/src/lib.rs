//! Session management and query orchestration for Pinpoint.

pub mod error;
pub mod orchestrator;
pub mod session;

pub use error::PinpointError;
pub use orchestrator::Orchestrator;
pub use session::{Session, ToolSource};
