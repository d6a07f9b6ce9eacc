//! Top-level error type for query processing.

use pinpoint_mcp::McpError;
use pinpoint_types::{ApiError, ConfigError};
use thiserror::Error;

/// Errors surfaced at the per-query boundary.
///
/// Tool-level failures never appear here — they are re-expressed as text
/// content by the tool server. What remains is backend failures, transport
/// failures, and configuration problems.
#[derive(Debug, Error)]
pub enum PinpointError {
    #[error("Backend error: {0}")]
    Backend(#[from] ApiError),

    #[error("Tool server error: {0}")]
    Mcp(#[from] McpError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
