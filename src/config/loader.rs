//! Configuration loader with layered precedence
//!
//! Config file lookup order (first existing file wins):
//! 1. Path given with `--config` (must exist)
//! 2. `$OPSERA_MCP_CONFIG`
//! 3. `./.opsera-mcp.toml` (project-specific)
//! 4. `~/.config/opsera-mcp/config.toml` (user-global)

use super::defaults::{default_config, DEV_API_KEY};
use super::UserConfig;
use crate::types::ConfigError;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const CONFIG_ENV_VAR: &str = "OPSERA_MCP_CONFIG";
pub const PORT_ENV_VAR: &str = "PORT";
pub const HOST_ENV_VAR: &str = "HOST";
pub const API_KEY_ENV_VAR: &str = "VALID_API_KEY";

/// Effective server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Shared secret expected in `Authorization: Bearer <key>`
    pub api_key: String,
    /// Per-session event buffer
    pub sse_buffer: usize,
    pub max_sessions: Option<usize>,
    pub idle_timeout: Option<Duration>,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn uses_dev_api_key(&self) -> bool {
        self.api_key == DEV_API_KEY
    }

    /// Apply command line overrides
    pub fn with_overrides(mut self, host: Option<IpAddr>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    fn apply_file(&mut self, file: UserConfig) {
        let server = file.server;
        if let Some(host) = server.host {
            self.host = host;
        }
        if let Some(port) = server.port {
            self.port = port;
        }
        if let Some(buffer) = server.sse_buffer {
            self.sse_buffer = buffer;
        }
        if server.max_sessions.is_some() {
            self.max_sessions = server.max_sessions;
        }
        if let Some(secs) = server.idle_timeout_secs {
            self.idle_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(api_key) = file.auth.api_key {
            self.api_key = api_key;
        }
    }

    fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = var(PORT_ENV_VAR) {
            self.port = port.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: PORT_ENV_VAR.to_string(),
                reason: format!("{} ({:?})", e, port),
            })?;
        }
        if let Some(host) = var(HOST_ENV_VAR) {
            self.host = host.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: HOST_ENV_VAR.to_string(),
                reason: format!("{} ({:?})", e, host),
            })?;
        }
        if let Some(api_key) = var(API_KEY_ENV_VAR) {
            self.api_key = api_key;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, reason: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        if self.api_key.trim().is_empty() {
            return Err(invalid("auth.api_key", "must not be empty"));
        }
        if self.sse_buffer == 0 {
            return Err(invalid("server.sse_buffer", "must be at least 1"));
        }
        if self.max_sessions == Some(0) {
            return Err(invalid("server.max_sessions", "must be at least 1"));
        }
        if self.idle_timeout == Some(Duration::ZERO) {
            return Err(invalid("server.idle_timeout_secs", "must be at least 1"));
        }
        Ok(())
    }
}

pub struct ConfigLoader {
    /// Explicit config file path (`--config`)
    explicit_path: Option<PathBuf>,

    /// Whether to search the default locations when no explicit path is set
    discover: bool,
}

impl ConfigLoader {
    pub fn new(explicit_path: Option<PathBuf>) -> Self {
        Self {
            explicit_path,
            discover: true,
        }
    }

    /// Only use the explicit path, never search default locations
    pub fn without_discovery(mut self) -> Self {
        self.discover = false;
        self
    }

    /// Load configuration using the process environment
    pub fn load(&self) -> Result<ServerConfig, ConfigError> {
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// Load configuration with an injected environment lookup
    pub fn load_with_env<F>(&self, env: F) -> Result<ServerConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = default_config();

        if let Some(path) = self.find_config_file(&env) {
            let file = Self::read_config_file(&path)?;
            info!("Loaded config file: {}", path.display());
            config.apply_file(file);
        } else {
            debug!("No config file found, using defaults");
        }

        config.apply_env(&env)?;
        config.validate()?;

        Ok(config)
    }

    fn find_config_file<F>(&self, env: &F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        // An explicit path is returned even when missing so reading it fails loudly
        if let Some(path) = &self.explicit_path {
            return Some(path.clone());
        }
        if !self.discover {
            return None;
        }

        let mut candidates = Vec::new();

        if let Some(config_path) = env(CONFIG_ENV_VAR) {
            candidates.push(PathBuf::from(config_path));
        }

        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join(".opsera-mcp.toml"));
        }

        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("opsera-mcp").join("config.toml"));
        }

        candidates.into_iter().find(|path| path.exists())
    }

    fn read_config_file(path: &Path) -> Result<UserConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
