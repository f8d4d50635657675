//! Configuration system
//!
//! Settings are layered, lowest to highest priority:
//! 1. Built-in defaults
//! 2. Config file (TOML)
//! 3. Environment variables (`PORT`, `HOST`, `VALID_API_KEY`)
//! 4. Command line flags

mod defaults;
mod loader;
mod user_config;

pub use defaults::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SSE_BUFFER, DEV_API_KEY};
pub use loader::{ConfigLoader, ServerConfig};
pub use user_config::{AuthSettings, ServerSettings, UserConfig};
