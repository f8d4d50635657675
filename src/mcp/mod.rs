//! MCP protocol types and the per-session request handler

pub mod protocol;
pub mod server;

pub use server::McpServer;
