//! Secret store backends.
//!
//! Defines the [`SecretBackend`] trait the reconciler drives, plus the
//! concrete stores: [`KubernetesBackend`] for clusters,
//! [`DirectoryBackend`] for local dry runs, and [`InMemoryBackend`] for tests.

mod directory;
mod kubernetes;
mod memory;

pub use directory::DirectoryBackend;
pub use kubernetes::KubernetesBackend;
pub use memory::{BackendCall, InMemoryBackend};

use std::sync::Arc;

use async_trait::async_trait;
use secretsync_core::config::StoreConfig;
use secretsync_core::paths;

use crate::error::Result;
use crate::types::{RemoteState, SecretId, SecretPayload, Signature};

/// Async trait for secret store backends.
///
/// Payload and signature are stored as separate objects, so an interrupted
/// `update` + `set_signature` pair leaves a stale signature behind that the
/// next run repairs.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Read the signature recorded for a secret.
    async fn get_signature(&self, id: &SecretId) -> Result<RemoteState>;

    /// Create the secret object.
    ///
    /// Fails with [`SecretError::AlreadyExists`](crate::SecretError::AlreadyExists)
    /// if the object is already present.
    async fn create(&self, id: &SecretId, payload: &SecretPayload) -> Result<()>;

    /// Replace the payload of an existing secret object.
    async fn update(&self, id: &SecretId, payload: &SecretPayload) -> Result<()>;

    /// Record `signature` for a secret, creating or replacing the record.
    async fn set_signature(&self, id: &SecretId, signature: &Signature) -> Result<()>;
}

/// Build the backend selected in the system config.
pub async fn from_config(config: &StoreConfig) -> Result<Arc<dyn SecretBackend>> {
    match config {
        StoreConfig::Kubernetes(k8s) => Ok(Arc::new(KubernetesBackend::from_config(k8s).await?)),
        StoreConfig::Directory { path } => {
            Ok(Arc::new(DirectoryBackend::new(paths::expand_tilde(path))))
        }
    }
}
