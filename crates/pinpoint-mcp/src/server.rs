//! Tool-server message loop.
//!
//! One line of input produces at most one line of output. Every failure in
//! per-line handling — unparseable JSON, unknown tool, missing argument,
//! upstream error — is translated into a content-bearing result in a
//! successful JSON-RPC envelope, so the conversation on the client side can
//! always continue. The loop terminates only when the input stream closes.

use crate::error::ToolError;
use crate::jsonrpc::{
    JsonRpcRequest, JsonRpcResponse, ToolAnnouncement, ToolCatalog, ToolDescriptor, ToolResult,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Async handler executing one tool invocation against its data source.
pub trait ToolHandler: Send + Sync {
    fn call<'a>(
        &'a self,
        arguments: &'a Map<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + 'a>>;
}

/// Blanket impl so plain async closures register directly.
impl<F, Fut> ToolHandler for F
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
{
    fn call<'a>(
        &'a self,
        arguments: &'a Map<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + 'a>> {
        Box::pin(self(arguments.clone()))
    }
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: Box<dyn ToolHandler>,
}

/// Lenient view of `tools/call` params; a missing name or missing arguments
/// map is a dispatch outcome, not a parse failure.
#[derive(Debug, Default, Deserialize)]
struct ToolCallParams {
    name: Option<String>,
    #[serde(default)]
    arguments: Map<String, Value>,
}

/// A tool server: a fixed catalog of tools plus the line-oriented message
/// loop that serves it.
#[derive(Default)]
pub struct ToolServer {
    tools: Vec<RegisteredTool>,
}

impl ToolServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. The catalog is immutable once the loop starts.
    pub fn register(mut self, descriptor: ToolDescriptor, handler: impl ToolHandler + 'static) -> Self {
        self.tools.push(RegisteredTool {
            descriptor,
            handler: Box::new(handler),
        });
        self
    }

    /// The full tool catalog.
    pub fn catalog(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor.clone()).collect()
    }

    /// Run the message loop over stdin/stdout.
    pub async fn run_stdio(&self) -> std::io::Result<()> {
        let reader = BufReader::new(tokio::io::stdin());
        let mut writer = tokio::io::stdout();
        self.run(reader, &mut writer).await
    }

    /// Run the message loop over arbitrary streams.
    ///
    /// Emits the unsolicited catalog announcement before reading anything,
    /// then serves one response per request line until EOF. Every response
    /// is flushed immediately so the client's read is never starved.
    pub async fn run<R, W>(&self, reader: R, writer: &mut W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let announcement = ToolAnnouncement::new(self.catalog());
        write_line(writer, &serde_json::to_string(&announcement)?).await?;

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(response) = self.handle_line(&line).await {
                write_line(writer, &serde_json::to_string(&response)?).await?;
            }
        }
        Ok(())
    }

    /// Handle one input line. `None` means no response is owed (requests
    /// with an unsupported method are ignored, matching the original
    /// server).
    async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(req) => req,
            Err(e) => return Some(parse_error_response(recover_id(line), &e.to_string())),
        };

        match request.method.as_str() {
            "tools/list" => {
                // Full catalog, regardless of any params.
                let catalog = ToolCatalog {
                    tools: self.catalog(),
                };
                let payload = serde_json::to_value(catalog).ok()?;
                Some(JsonRpcResponse::success(request.id, payload))
            }
            "tools/call" => Some(self.handle_call(request).await),
            other => {
                tracing::debug!(method = %other, "ignoring request with unsupported method");
                None
            }
        }
    }

    async fn handle_call(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let params: ToolCallParams = match request.params {
            None => ToolCallParams::default(),
            Some(value) => match serde_json::from_value(value) {
                Ok(p) => p,
                Err(e) => return parse_error_response(request.id, &e.to_string()),
            },
        };

        let result = self.dispatch(params).await;
        match serde_json::to_value(&result) {
            Ok(payload) => JsonRpcResponse::success(request.id, payload),
            Err(e) => parse_error_response(request.id, &e.to_string()),
        }
    }

    /// Dispatch one tool call. Always yields a content-bearing result.
    async fn dispatch(&self, params: ToolCallParams) -> ToolResult {
        let tool = params
            .name
            .as_deref()
            .and_then(|name| self.tools.iter().find(|t| t.descriptor.name == name));

        let (Some(tool), false) = (tool, params.arguments.is_empty()) else {
            return ToolResult::text("Invalid tool name or missing arguments");
        };

        if let Some(missing) = first_missing_required(&tool.descriptor, &params.arguments) {
            return ToolResult::text(format!("Missing '{missing}' in input"));
        }

        tracing::debug!(tool = %tool.descriptor.name, "executing tool call");
        match tool.handler.call(&params.arguments).await {
            Ok(payload) => ToolResult::text(payload),
            Err(e) => ToolResult::text(format!("API error: {e}")),
        }
    }
}

/// First property from the descriptor's `required` list absent from the
/// argument map, if any. A null or empty-string value counts as absent.
fn first_missing_required<'a>(
    descriptor: &'a ToolDescriptor,
    arguments: &Map<String, Value>,
) -> Option<&'a str> {
    descriptor
        .input_schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find(|key| match arguments.get(*key) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        })
}

/// Best-effort id recovery from an unparseable line; defaults to 0. This
/// knowingly breaks strict id correlation for that one response.
fn recover_id(line: &str) -> u64 {
    serde_json::from_str::<Value>(line)
        .ok()
        .and_then(|v| v.get("id").and_then(Value::as_u64))
        .unwrap_or(0)
}

fn parse_error_response(id: u64, message: &str) -> JsonRpcResponse {
    let result = ToolResult::text(format!("Error parsing input: {message}"));
    // ToolResult serialization cannot fail; fall back to an empty object to
    // keep the envelope well-formed regardless.
    let payload = serde_json::to_value(result).unwrap_or_else(|_| serde_json::json!({}));
    JsonRpcResponse::success(id, payload)
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
