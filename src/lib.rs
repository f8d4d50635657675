//! Opsera MCP - DevOps prompt catalog for Model Context Protocol
//!
//! Serves a fixed catalog of DevOps prompts and tools to MCP clients over an
//! authenticated SSE transport, with plain HTTP routes for clients that
//! cannot hold a stream open.

pub mod catalog;
pub mod config;
pub mod mcp;
pub mod server;
pub mod session;
pub mod types;

pub use catalog::Catalog;
pub use config::{ConfigLoader, ServerConfig};
pub use mcp::McpServer;
pub use server::{make_app, run_server, ServerState};
pub use session::SessionRegistry;
pub use types::{CatalogError, ConfigError, SessionError};
