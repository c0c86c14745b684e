//! Path resolution utilities.

use std::path::{Path, PathBuf};

/// Default root of per-service configuration (`<soa_dir>/<service>/...`).
pub const DEFAULT_SOA_DIR: &str = "/nail/etc/services";

/// Default directory holding the system configuration `*.json` files.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/secretsync";

/// Default directory holding raw credential source files.
pub const DEFAULT_CREDENTIALS_DIR: &str = "/etc/boto_cfg";

/// Name of the per-service directory holding secret definition files.
const SECRETS_DIR_NAME: &str = "secrets";

/// Get a service's configuration directory (`<soa_dir>/<service>`).
pub fn service_dir(soa_dir: &Path, service: &str) -> PathBuf {
    soa_dir.join(service)
}

/// Get a service's secret definitions directory (`<soa_dir>/<service>/secrets`).
pub fn secrets_dir(soa_dir: &Path, service: &str) -> PathBuf {
    service_dir(soa_dir, service).join(SECRETS_DIR_NAME)
}

/// Get the per-cluster instance config (`<soa_dir>/<service>/kubernetes-<cluster>.yaml`).
pub fn instance_config_file(soa_dir: &Path, service: &str, cluster: &str) -> PathBuf {
    service_dir(soa_dir, service).join(format!("kubernetes-{cluster}.yaml"))
}

/// Get the source file for a named credential key.
pub fn credential_file(credentials_dir: &Path, key: &str) -> PathBuf {
    credentials_dir.join(key)
}

/// Expand tilde (~) in a path.
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
