//! Secret sync for secretsync.
//!
//! Discovers a service's secret definitions, computes their signatures, and
//! reconciles them against a secret store so that only changed secrets are
//! written.

pub mod backend;
pub mod crypto;
pub mod discovery;
pub mod driver;
pub mod error;
pub mod keys;
pub mod naming;
pub mod provider;
pub mod reconcile;
pub mod signature;
pub mod types;

pub use backend::{DirectoryBackend, InMemoryBackend, KubernetesBackend, SecretBackend};
pub use driver::{sync_all_secrets, sync_service, sync_services, ServiceReport, SyncContext};
pub use error::{Result, SecretError};
pub use provider::SecretProvider;
pub use reconcile::{Outcome, Reconciler};
pub use types::{RemoteState, SecretDefinition, SecretId, SecretPayload, Signature};
