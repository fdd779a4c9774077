//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::RelayError;

/// Configuration loading, validation, and wiring errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    // ─────────────────────────────────────────────────────────────────────────
    // Value validation
    // ─────────────────────────────────────────────────────────────────────────
    /// Peer URL does not parse or is not http(s).
    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// Endpoint path is not absolute or collides with a built-in route.
    #[error("invalid server path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    /// A size or concurrency limit is zero.
    #[error("'{field}' must be greater than zero")]
    ZeroLimit { field: &'static str },

    /// A method entry has an empty name.
    #[error("method entry #{index} has an empty name")]
    EmptyMethodName { index: usize },

    /// The same method is configured twice.
    #[error("duplicate method: '{name}'")]
    DuplicateMethod { name: String },

    /// A method name is taken by a built-in handler.
    #[error("method '{name}' is reserved")]
    ReservedMethod { name: String },

    /// `${VAR}` used without a default and the variable is unset.
    #[error("environment variable '{var}' not set")]
    MissingEnvVar { var: String },

    // ─────────────────────────────────────────────────────────────────────────
    // I/O and parsing
    // ─────────────────────────────────────────────────────────────────────────
    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    ParseError(#[from] serde_yml::Error),

    /// I/O error reading config file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Config file not found at any search location.
    #[error("configuration file not found (searched: {searched:?})")]
    ConfigFileNotFound { searched: Vec<PathBuf> },

    /// Empty configuration file.
    #[error("configuration file is empty")]
    EmptyConfigFile,

    // ─────────────────────────────────────────────────────────────────────────
    // Wiring
    // ─────────────────────────────────────────────────────────────────────────
    /// Building a handler or client failed.
    #[error(transparent)]
    Relay(#[from] RelayError),
}
