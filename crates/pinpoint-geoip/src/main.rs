//! Pinpoint geoip — an IP geolocation tool server.
//!
//! Speaks newline-delimited JSON-RPC on stdin/stdout. All logging goes to
//! stderr: stdout is the protocol channel.

mod lookup;

use anyhow::Result;
use lookup::GeoLookup;
use pinpoint_mcp::{ToolDescriptor, ToolError, ToolServer};
use serde_json::{Map, Value};
use std::io;
use std::sync::Arc;

fn lookup_descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: "ip_location_lookup".to_string(),
        description: "Returns location info for a given IP address using ipinfo.io".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "ip": {"type": "string"}
            },
            "required": ["ip"]
        }),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    tracing::debug!("geoip tool server started");

    let geo = Arc::new(GeoLookup::new()?);

    let server = ToolServer::new().register(lookup_descriptor(), move |args: Map<String, Value>| {
        let geo = Arc::clone(&geo);
        async move {
            let ip = args
                .get("ip")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::Upstream("'ip' must be a string".to_string()))?;
            geo.lookup(ip).await
        }
    });

    server.run_stdio().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_requires_string_ip() {
        let desc = lookup_descriptor();
        assert_eq!(desc.name, "ip_location_lookup");
        assert_eq!(desc.input_schema["properties"]["ip"]["type"], "string");
        assert_eq!(desc.input_schema["required"][0], "ip");
    }
}
