//! Shared error types

pub mod errors;

pub use errors::{CatalogError, ConfigError, SessionError};
