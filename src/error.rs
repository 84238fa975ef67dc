//! Error types for chart-optimizer.
//!
//! Only input loading (fleet files, node inventories, configuration) is
//! fallible. Engine passes degrade to per-item notes instead of returning
//! errors.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error for the crate.
#[derive(Debug, Error)]
pub enum OptimizerError {
    /// Filesystem access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML could not be parsed or serialized
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON could not be parsed or serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML could not be parsed
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration problems
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Input file had the wrong shape
    #[error("Invalid input in {path}: {message}")]
    InvalidInput {
        /// File that was being loaded
        path: PathBuf,
        /// What was wrong with it
        message: String,
    },
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file was not found at an explicitly requested path
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    /// A value was outside its accepted range
    #[error("invalid value for `{key}`: {message}")]
    InvalidValue {
        /// Dotted key of the offending setting
        key: String,
        /// Reason the value was rejected
        message: String,
    },
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, OptimizerError>;
