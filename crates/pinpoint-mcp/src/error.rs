//! Error types for tool-protocol operations.

use thiserror::Error;

/// Errors from tool-server communication.
///
/// These surface to the caller of session establishment; they are never
/// sent across the transport as protocol faults.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Failed to spawn tool server '{name}': {source}")]
    SpawnFailed {
        name: String,
        source: std::io::Error,
    },

    #[error("Tool server '{name}' did not announce its catalog within {timeout_ms}ms")]
    Handshake { name: String, timeout_ms: u64 },

    #[error("JSON-RPC error from '{server}' (code {code}): {message}")]
    JsonRpc {
        server: String,
        code: i64,
        message: String,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from executing a tool against its upstream data source.
///
/// The server loop never propagates these: they are re-expressed as
/// "API error: ..." text content in an otherwise successful response.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    Upstream(String),

    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("invalid upstream payload: {0}")]
    Decode(String),
}
