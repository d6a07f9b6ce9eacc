//! JSON-RPC 2.0 envelopes and tool-protocol payloads.

use serde::{Deserialize, Serialize};

fn jsonrpc_version() -> String {
    "2.0".to_string()
}

/// A JSON-RPC 2.0 request.
///
/// `method` and `id` default when absent so lenient lines still parse;
/// dispatch treats an empty method as unsupported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request.
    pub fn new(id: u64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: u64, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Wire discriminant of the unsolicited catalog announcement.
pub const ANNOUNCEMENT_KIND: &str = "toolDetails";

/// The unsolicited catalog advertisement a tool server emits once at
/// startup, before reading any request. Not part of the request/response
/// pairing; the client also uses it as the readiness signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolAnnouncement {
    #[serde(rename = "type")]
    pub kind: String,
    pub tools: Vec<ToolDescriptor>,
}

impl ToolAnnouncement {
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            kind: ANNOUNCEMENT_KIND.to_string(),
            tools,
        }
    }
}

/// A tool exposed by a tool server. Immutable for the server's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default = "default_schema")]
    pub input_schema: serde_json::Value,
}

fn default_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// The `tools/list` result payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCatalog {
    pub tools: Vec<ToolDescriptor>,
}

/// The `tools/call` result payload. Content is never empty — failures are
/// encoded as text content, never as protocol-level faults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
}

impl ToolResult {
    /// A result with a single text item.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
        }
    }

    /// Concatenate all text items, newline-joined.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                ToolContent::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A content item in a tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}
