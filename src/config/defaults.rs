//! Built-in defaults
//!
//! The API key default is a development value and is logged as insecure
//! whenever the server runs with it.

use super::ServerConfig;
use std::net::{IpAddr, Ipv4Addr};

pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
pub const DEFAULT_PORT: u16 = 3847;
pub const DEV_API_KEY: &str = "opsera-dev-key-12345";
pub const DEFAULT_SSE_BUFFER: usize = 64;

pub fn default_config() -> ServerConfig {
    ServerConfig {
        host: DEFAULT_HOST,
        port: DEFAULT_PORT,
        api_key: DEV_API_KEY.to_string(),
        sse_buffer: DEFAULT_SSE_BUFFER,
        max_sessions: None,
        idle_timeout: None,
    }
}
