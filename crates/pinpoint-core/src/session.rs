//! Session — the stateful pairing of one transport with one tool catalog.

use pinpoint_mcp::{McpClient, McpError, McpServerConfig, ToolDescriptor, ToolResult};
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;

/// Source of tools for the orchestration loop.
///
/// The seam between orchestration and the wire: `Session` implements it
/// over a live tool-server process; tests implement it in memory.
/// Dyn-compatible so the orchestrator takes `&dyn ToolSource`.
pub trait ToolSource: Send + Sync {
    /// Fetch the current catalog (not assumed static between queries).
    fn list_tools(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ToolDescriptor>, McpError>> + Send + '_>>;

    /// Execute one tool call.
    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: Map<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<ToolResult, McpError>> + Send + 'a>>;
}

/// One live tool-server connection.
///
/// Lifecycle: created → initializing (handshake in flight, inside
/// `connect`) → ready → closed. The underlying child process is killed on
/// drop, so the transport is released even when initialization fails or a
/// query errors before `close` runs.
pub struct Session {
    client: McpClient,
}

impl Session {
    /// Spawn the configured tool server and run the initialization
    /// handshake. Errors are reported to the caller, never fatal to the
    /// process.
    pub async fn connect(name: impl Into<String>, config: &McpServerConfig) -> Result<Self, McpError> {
        let client = McpClient::connect(name.into(), config).await?;
        Ok(Self { client })
    }

    /// The connected server's name.
    pub fn server_name(&self) -> &str {
        self.client.server_name()
    }

    /// The catalog discovered during initialization.
    pub fn tools(&self) -> &[ToolDescriptor] {
        self.client.tools()
    }

    /// Close the session, releasing the transport and reaping the child.
    /// Consumes the session: a closed session cannot be reused, and the
    /// transport is released exactly once.
    pub async fn close(self) {
        self.client.shutdown().await;
    }
}

impl ToolSource for Session {
    fn list_tools(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ToolDescriptor>, McpError>> + Send + '_>> {
        Box::pin(self.client.list_tools())
    }

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: Map<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<ToolResult, McpError>> + Send + 'a>> {
        Box::pin(self.client.call_tool(name, arguments))
    }
}
