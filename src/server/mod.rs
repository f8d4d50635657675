//! HTTP surface: MCP over SSE plus the legacy plain-request routes

mod auth;
mod error;
mod rest;
mod server;
mod sse;
mod state;

pub use auth::{Authorized, AUTHORIZATION_SCHEME};
pub use error::ApiError;
pub use server::{make_app, run_server};
pub use sse::{SessionStream, MESSAGE_PATH};
pub use state::ServerState;
