//! Configuration schema definitions.

use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Default in-cluster service account token.
pub const SERVICE_ACCOUNT_TOKEN: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Default in-cluster service account CA bundle.
pub const SERVICE_ACCOUNT_CA: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// Main secretsync system configuration.
///
/// Assembled from every `*.json` file in the configuration directory; see
/// [`SystemConfig::load_dir`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Cluster this host belongs to. `--cluster` overrides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,

    /// How secret definition files are turned into signatures and payloads.
    #[serde(default)]
    pub secret_provider: ProviderConfig,

    /// Cluster name to secret ecosystem mapping.
    #[serde(default)]
    pub vault_cluster_config: BTreeMap<String, String>,

    /// Where reconciled secrets are written.
    #[serde(default)]
    pub secret_store: StoreConfig,

    /// Directory holding raw credential source files.
    #[serde(default = "default_credentials_dir")]
    pub credentials_dir: PathBuf,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            cluster: None,
            secret_provider: ProviderConfig::default(),
            vault_cluster_config: BTreeMap::new(),
            secret_store: StoreConfig::default(),
            credentials_dir: default_credentials_dir(),
        }
    }
}

fn default_credentials_dir() -> PathBuf {
    PathBuf::from(paths::DEFAULT_CREDENTIALS_DIR)
}

/// Secret content provider selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Definition files carry their value in clear text.
    #[default]
    Plaintext,

    /// Definition files carry per-ecosystem AES-256-GCM ciphertext.
    Encrypted {
        /// File holding the hex-encoded master key. The
        /// `SECRETSYNC_MASTER_KEY` environment variable takes precedence.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key_file: Option<PathBuf>,
    },
}

/// Secret store backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Kubernetes API server.
    Kubernetes(KubernetesStoreConfig),

    /// Local directory standing in for the cluster store.
    Directory {
        /// Root directory for stored secrets and signatures.
        path: PathBuf,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Kubernetes(KubernetesStoreConfig::default())
    }
}

/// Kubernetes secret store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesStoreConfig {
    /// API server URL. Defaults to the in-cluster service address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_server: Option<String>,

    /// Namespace holding the secrets and signature config maps.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Bearer token file.
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,

    /// CA bundle used to verify the API server, if present on disk.
    #[serde(default = "default_ca_file")]
    pub ca_file: PathBuf,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for KubernetesStoreConfig {
    fn default() -> Self {
        Self {
            api_server: None,
            namespace: default_namespace(),
            token_file: default_token_file(),
            ca_file: default_ca_file(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_namespace() -> String {
    "paasta".to_string()
}

fn default_token_file() -> PathBuf {
    PathBuf::from(SERVICE_ACCOUNT_TOKEN)
}

fn default_ca_file() -> PathBuf {
    PathBuf::from(SERVICE_ACCOUNT_CA)
}

fn default_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SystemConfig::default();
        assert!(config.cluster.is_none());
        assert_eq!(config.secret_provider, ProviderConfig::Plaintext);
        assert_eq!(config.credentials_dir, PathBuf::from("/etc/boto_cfg"));
        match config.secret_store {
            StoreConfig::Kubernetes(k8s) => {
                assert_eq!(k8s.namespace, "paasta");
                assert_eq!(k8s.timeout_secs, 30);
            }
            other => panic!("unexpected store: {other:?}"),
        }
    }

    #[test]
    fn test_tagged_provider() {
        let provider: ProviderConfig =
            serde_json::from_str(r#"{"type": "encrypted", "key_file": "/etc/key"}"#).unwrap();
        assert_eq!(
            provider,
            ProviderConfig::Encrypted {
                key_file: Some(PathBuf::from("/etc/key"))
            }
        );
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let result = serde_json::from_str::<ProviderConfig>(r#"{"type": "vault"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_tagged_store() {
        let store: StoreConfig =
            serde_json::from_str(r#"{"type": "kubernetes", "namespace": "secrets"}"#).unwrap();
        match store {
            StoreConfig::Kubernetes(k8s) => {
                assert_eq!(k8s.namespace, "secrets");
                assert_eq!(k8s.token_file, PathBuf::from(SERVICE_ACCOUNT_TOKEN));
            }
            other => panic!("unexpected store: {other:?}"),
        }

        let store: StoreConfig =
            serde_json::from_str(r#"{"type": "directory", "path": "/tmp/store"}"#).unwrap();
        assert_eq!(
            store,
            StoreConfig::Directory {
                path: PathBuf::from("/tmp/store")
            }
        );
    }
}
