//! Error types for secret synchronization.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reconciling secrets.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The secret object already exists in the store. Raised by `create`
    /// and recovered by the reconciler.
    #[error("Secret already exists: {0}")]
    AlreadyExists(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Malformed secret definition {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("Malformed instance config {path}: {reason}")]
    MalformedInstanceConfig { path: PathBuf, reason: String },

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Master key error: {0}")]
    MasterKey(String),

    #[error("Invalid secret name: {0}")]
    InvalidName(String),

    #[error("Configuration error: {0}")]
    Config(#[from] secretsync_core::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SecretError {
    /// Shorthand for a malformed definition file.
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience result alias for secret operations.
pub type Result<T> = std::result::Result<T, SecretError>;
