//! Configuration for a single tool server.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_init_timeout() -> u64 {
    5000
}

/// Launch spec for one tool server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Command to run (e.g., "pinpoint-geoip", "python").
    pub command: String,
    /// Arguments to pass to the command.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variables to set for the server process.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Bounded wait for the startup catalog announcement, in milliseconds
    /// (default: 5000). The only deadline in the protocol.
    #[serde(default = "default_init_timeout")]
    pub init_timeout_ms: u64,
}
