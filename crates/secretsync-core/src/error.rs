//! Error types for secretsync core.

use std::path::PathBuf;
use thiserror::Error;

/// Core result type alias.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found: {0}")]
    NotFound(PathBuf),

    #[error("Parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No cluster configured; pass --cluster or set \"cluster\" in the system config")]
    MissingCluster,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
