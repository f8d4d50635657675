use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Prompt not found: {0}")]
    UnknownPrompt(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: &'static str, reason: String },

    #[error("Missing prompt body for {0}")]
    MissingBody(&'static str),

    #[error("Prompt body for {0} is not valid UTF-8")]
    InvalidBody(&'static str),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid session")]
    NotFound,

    #[error("Session limit reached ({0} active sessions)")]
    CapacityExceeded(usize),

    #[error("Session transport failure: {0}")]
    Transport(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
