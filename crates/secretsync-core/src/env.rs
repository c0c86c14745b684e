//! Environment variable handling.

use std::env;

/// Well-known environment variable names.
pub mod vars {
    /// Hex-encoded master key for the encrypted provider.
    pub const MASTER_KEY: &str = "SECRETSYNC_MASTER_KEY";
    /// Host of the in-cluster Kubernetes API server.
    pub const KUBERNETES_SERVICE_HOST: &str = "KUBERNETES_SERVICE_HOST";
    /// Port of the in-cluster Kubernetes API server.
    pub const KUBERNETES_SERVICE_PORT: &str = "KUBERNETES_SERVICE_PORT";
}

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
pub fn get_var_or(name: &str, default: &str) -> String {
    get_var(name).unwrap_or_else(|| default.to_string())
}
