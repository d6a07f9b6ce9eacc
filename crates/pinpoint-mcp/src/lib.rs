//! Stdio JSON-RPC tool protocol for Pinpoint.
//!
//! Tool servers communicate over newline-delimited JSON-RPC 2.0 messages on
//! stdin/stdout. This crate carries both sides of the wire: the client
//! (spawn a server as a child process, handshake, discover and call tools)
//! and the server message loop (announce a catalog, answer `tools/list`,
//! execute `tools/call`, convert every failure into a content-bearing
//! result).

pub mod client;
pub mod config;
pub mod error;
pub mod jsonrpc;
pub mod server;
mod transport;

pub use client::McpClient;
pub use config::McpServerConfig;
pub use error::{McpError, ToolError};
pub use jsonrpc::{ToolAnnouncement, ToolContent, ToolDescriptor, ToolResult};
pub use server::{ToolHandler, ToolServer};
