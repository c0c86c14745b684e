//! Configuration loading and validation.

use super::{ProviderConfig, StoreConfig, SystemConfig};
use crate::error::ConfigError;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

impl SystemConfig {
    /// Load configuration from every `*.json` file in `dir`.
    ///
    /// Files are read in filename order and merged key by key at the top
    /// level, so a later file replaces whole sections of an earlier one.
    pub fn load_dir(dir: &Path) -> Result<Self, ConfigError> {
        if !dir.is_dir() {
            return Err(ConfigError::NotFound(dir.to_path_buf()));
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json")
            })
            .collect();
        files.sort();

        let mut merged = Map::new();
        for path in &files {
            debug!(path = %path.display(), "loading system config file");
            let content = fs::read_to_string(path)?;
            match parse_value(path, &content)? {
                Value::Object(section) => merged.extend(section),
                _ => {
                    return Err(ConfigError::Parse {
                        path: path.clone(),
                        message: "top-level value must be an object".to_string(),
                    })
                }
            }
        }

        serde_json::from_value(Value::Object(merged)).map_err(|e| ConfigError::Parse {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load configuration from `dir`, falling back to defaults if it does not exist.
    pub fn load_dir_or_default(dir: &Path) -> Result<Self, ConfigError> {
        match Self::load_dir(dir) {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound(path)) => {
                debug!(path = %path.display(), "no system config directory, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Parse configuration from a single document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        // 1. Cluster name, when set, must be usable in a file name
        if let Some(cluster) = &self.cluster {
            if cluster.trim().is_empty() {
                errors.push("Cluster name must not be empty".to_string());
            } else if cluster.contains('/') {
                errors.push(format!("Cluster name '{}' must not contain '/'", cluster));
            }
        }

        // 2. Ecosystem mapping values must be present
        for (cluster, ecosystem) in &self.vault_cluster_config {
            if ecosystem.trim().is_empty() {
                errors.push(format!("Cluster '{}' maps to an empty ecosystem", cluster));
            }
        }

        // 3. Encrypted provider key file, when set, must not be blank
        if let ProviderConfig::Encrypted {
            key_file: Some(path),
        } = &self.secret_provider
        {
            if path.as_os_str().is_empty() {
                errors.push("Encrypted provider key_file must not be empty".to_string());
            }
        }

        // 4. Store settings
        match &self.secret_store {
            StoreConfig::Kubernetes(k8s) => {
                if k8s.namespace.is_empty() {
                    errors.push("Kubernetes namespace must not be empty".to_string());
                }
                if k8s.timeout_secs == 0 {
                    errors.push("Kubernetes timeout_secs must be greater than 0".to_string());
                }
                if let Some(server) = &k8s.api_server {
                    if !(server.starts_with("https://") || server.starts_with("http://")) {
                        errors.push(format!(
                            "Kubernetes api_server '{}' must be an http(s) URL",
                            server
                        ));
                    }
                }
            }
            StoreConfig::Directory { path } => {
                if path.as_os_str().is_empty() {
                    errors.push("Directory store path must not be empty".to_string());
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }

    /// Resolve the cluster to sync, preferring an explicit override.
    pub fn resolve_cluster(&self, cluster_override: Option<&str>) -> Result<String, ConfigError> {
        cluster_override
            .or(self.cluster.as_deref())
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string)
            .ok_or(ConfigError::MissingCluster)
    }

    /// Secret ecosystem for a cluster, defaulting to the cluster name itself.
    pub fn ecosystem_for<'a>(&'a self, cluster: &'a str) -> &'a str {
        self.vault_cluster_config
            .get(cluster)
            .map(String::as_str)
            .unwrap_or(cluster)
    }
}

fn parse_value(path: &Path, content: &str) -> Result<Value, ConfigError> {
    json5::from_str(content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Configuration builder for creating configs programmatically.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: SystemConfig,
}

impl ConfigBuilder {
    /// Create a new config builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cluster.
    pub fn cluster(mut self, cluster: impl Into<String>) -> Self {
        self.config.cluster = Some(cluster.into());
        self
    }

    /// Set the secret provider.
    pub fn provider(mut self, provider: ProviderConfig) -> Self {
        self.config.secret_provider = provider;
        self
    }

    /// Map a cluster to a secret ecosystem.
    pub fn ecosystem(mut self, cluster: impl Into<String>, ecosystem: impl Into<String>) -> Self {
        self.config
            .vault_cluster_config
            .insert(cluster.into(), ecosystem.into());
        self
    }

    /// Set the secret store.
    pub fn store(mut self, store: StoreConfig) -> Self {
        self.config.secret_store = store;
        self
    }

    /// Set the credentials directory.
    pub fn credentials_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.credentials_dir = dir.into();
        self
    }

    /// Finish building.
    pub fn build(self) -> SystemConfig {
        self.config
    }
}
