//! Tool-server client — manages one server connection.
//!
//! Handles the startup handshake (a bounded wait for the server's
//! `toolDetails` announcement), tool discovery (`tools/list`), and tool
//! invocation (`tools/call`).

use crate::config::McpServerConfig;
use crate::error::McpError;
use crate::jsonrpc::{ToolCatalog, ToolDescriptor, ToolResult};
use crate::transport::StdioTransport;
use serde_json::{Map, Value};
use std::time::Duration;

/// Client for a single tool server.
#[derive(Debug)]
pub struct McpClient {
    name: String,
    transport: StdioTransport,
    tools: Vec<ToolDescriptor>,
}

impl McpClient {
    /// Connect to a tool server: spawn, await the catalog announcement,
    /// discover tools.
    ///
    /// The announcement wait is the only time-bounded operation; on timeout
    /// the child is released and an error is returned for the caller to
    /// retry or abort.
    pub async fn connect(name: String, config: &McpServerConfig) -> Result<Self, McpError> {
        let transport = StdioTransport::spawn(&config.command, &config.args, &config.env)?;

        let announced = tokio::time::timeout(
            Duration::from_millis(config.init_timeout_ms),
            transport.recv_announcement(),
        )
        .await;

        let announcement = match announced {
            Ok(Some(ann)) => ann,
            Ok(None) | Err(_) => {
                transport.shutdown().await;
                return Err(McpError::Handshake {
                    name,
                    timeout_ms: config.init_timeout_ms,
                });
            }
        };

        tracing::debug!(
            server = %name,
            announced = announcement.tools.len(),
            "tool server announced its catalog"
        );

        // The announcement doubles as the readiness signal; the catalog cache
        // comes from an explicit tools/list query.
        let tools = match Self::fetch_tools(&transport, &name).await {
            Ok(tools) => tools,
            Err(e) => {
                transport.shutdown().await;
                return Err(e);
            }
        };

        tracing::info!("Tool server '{}' connected with {} tools", name, tools.len());

        Ok(Self {
            name,
            transport,
            tools,
        })
    }

    async fn fetch_tools(
        transport: &StdioTransport,
        server: &str,
    ) -> Result<Vec<ToolDescriptor>, McpError> {
        let resp = transport.send_request("tools/list", None).await?;

        if let Some(err) = resp.error {
            return Err(McpError::JsonRpc {
                server: server.to_string(),
                code: err.code,
                message: err.message,
            });
        }

        let result = resp.result.ok_or_else(|| {
            McpError::Protocol("tools/list response has neither result nor error".to_string())
        })?;

        let catalog: ToolCatalog = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Failed to parse tools/list response: {e}")))?;

        Ok(catalog.tools)
    }

    /// Query the server's catalog afresh (the catalog is not assumed static).
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        Self::fetch_tools(&self.transport, &self.name).await
    }

    /// Call a tool on this server.
    pub async fn call_tool(
        &self,
        tool_name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolResult, McpError> {
        let params = serde_json::json!({
            "name": tool_name,
            "arguments": arguments,
        });

        let resp = self
            .transport
            .send_request("tools/call", Some(params))
            .await?;

        if let Some(err) = resp.error {
            return Err(McpError::JsonRpc {
                server: self.name.clone(),
                code: err.code,
                message: err.message,
            });
        }

        let result = resp.result.ok_or_else(|| {
            McpError::Protocol("tools/call response has neither result nor error".to_string())
        })?;

        serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Failed to parse tools/call result: {e}")))
    }

    /// The catalog discovered at connect time.
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// The server name.
    pub fn server_name(&self) -> &str {
        &self.name
    }

    /// Shut down the server connection.
    pub async fn shutdown(self) {
        self.transport.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn mock_server_config(script: &str, init_timeout_ms: u64) -> McpServerConfig {
        McpServerConfig {
            command: "bash".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            env: HashMap::new(),
            init_timeout_ms,
        }
    }

    // A pure-bash mock: announce, then answer every line with the next
    // sequential id (matching the client's id allocation from 1).
    const MOCK_SERVER: &str = r#"
echo '{"type":"toolDetails","tools":[{"name":"ip_location_lookup","description":"IP lookup","inputSchema":{"type":"object","properties":{"ip":{"type":"string"}},"required":["ip"]}}]}'
i=1
while IFS= read -r line; do
  case "$line" in
    *tools/list*)
      echo "{\"jsonrpc\":\"2.0\",\"id\":$i,\"result\":{\"tools\":[{\"name\":\"ip_location_lookup\",\"description\":\"IP lookup\",\"inputSchema\":{\"type\":\"object\",\"properties\":{\"ip\":{\"type\":\"string\"}},\"required\":[\"ip\"]}}]}}"
      ;;
    *)
      echo "{\"jsonrpc\":\"2.0\",\"id\":$i,\"result\":{\"content\":[{\"type\":\"text\",\"text\":\"{\\\"city\\\":\\\"Boardman\\\"}\"}]}}"
      ;;
  esac
  i=$((i+1))
done
"#;

    #[tokio::test]
    async fn connect_discovers_catalog() {
        let config = mock_server_config(MOCK_SERVER, 5000);
        let client = match McpClient::connect("mock".to_string(), &config).await {
            Ok(c) => c,
            Err(McpError::SpawnFailed { .. }) => return, // no bash available
            Err(other) => panic!("connect failed: {other:?}"),
        };

        assert_eq!(client.server_name(), "mock");
        assert_eq!(client.tools().len(), 1);
        assert_eq!(client.tools()[0].name, "ip_location_lookup");
        client.shutdown().await;
    }

    #[tokio::test]
    async fn list_tools_is_idempotent() {
        let config = mock_server_config(MOCK_SERVER, 5000);
        let client = match McpClient::connect("mock".to_string(), &config).await {
            Ok(c) => c,
            Err(_) => return,
        };

        let first = client.list_tools().await.unwrap();
        let second = client.list_tools().await.unwrap();
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].name, second[0].name);
        client.shutdown().await;
    }

    #[tokio::test]
    async fn call_tool_returns_text_content() {
        let config = mock_server_config(MOCK_SERVER, 5000);
        let client = match McpClient::connect("mock".to_string(), &config).await {
            Ok(c) => c,
            Err(_) => return,
        };

        let mut args = Map::new();
        args.insert("ip".to_string(), Value::String("8.8.8.8".to_string()));
        let result = client.call_tool("ip_location_lookup", args).await.unwrap();
        assert_eq!(result.content.len(), 1);
        assert!(result.joined_text().contains("Boardman"));
        client.shutdown().await;
    }

    #[tokio::test]
    async fn handshake_times_out_against_silent_server() {
        // A server that never announces its catalog.
        let config = mock_server_config("sleep 10", 100);
        let result = McpClient::connect("silent".to_string(), &config).await;
        match result {
            Err(McpError::Handshake { name, timeout_ms }) => {
                assert_eq!(name, "silent");
                assert_eq!(timeout_ms, 100);
            }
            Err(McpError::SpawnFailed { .. }) => {} // no bash available
            other => panic!("Expected Handshake error, got: {other:?}"),
        }
    }

    #[test]
    fn parse_catalog_payload() {
        let json = r#"{
            "tools": [
                {"name": "a", "description": "Tool A", "inputSchema": {"type": "object"}},
                {"name": "b"}
            ]
        }"#;
        let catalog: ToolCatalog = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.tools.len(), 2);
        assert_eq!(catalog.tools[0].name, "a");
        assert!(catalog.tools[1].description.is_empty());
    }
}
