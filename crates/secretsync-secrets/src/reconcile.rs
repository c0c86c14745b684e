//! Per-secret reconciliation against a [`SecretBackend`].

use std::fmt;

use tracing::{debug, info, warn};

use crate::backend::SecretBackend;
use crate::error::{Result, SecretError};
use crate::provider::SecretProvider;
use crate::signature;
use crate::types::{RemoteState, SecretContent, SecretDefinition, SecretId, SecretPayload, Signature};

/// How a local signature relates to what the store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    NoRemote,
    UpToDate,
    Stale,
}

impl ReconcileState {
    /// Compare a local signature with the remote state. A secret stored
    /// without a signature counts as stale.
    pub fn assess(local: &Signature, remote: &RemoteState) -> Self {
        match remote {
            RemoteState::Absent => Self::NoRemote,
            RemoteState::Signed(remote) if remote == local => Self::UpToDate,
            RemoteState::Signed(_) | RemoteState::Unsigned => Self::Stale,
        }
    }
}

/// What happened to one secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    UpToDate,
    /// The object appeared between the read and the create. Left for the next
    /// run, which will see it unsigned and update it.
    CreateConflict,
    /// Nothing to sync locally.
    Skipped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::UpToDate => "up to date",
            Self::CreateConflict => "create conflict",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Drives one secret at a time from its local definition to the store.
pub struct Reconciler<'a> {
    backend: &'a dyn SecretBackend,
}

impl<'a> Reconciler<'a> {
    pub fn new(backend: &'a dyn SecretBackend) -> Self {
        Self { backend }
    }

    /// Bring the stored secret in line with `signature`.
    ///
    /// `payload` is only invoked when a create or update is needed, so
    /// decryption is skipped for secrets that are already current. A `None`
    /// signature means there is nothing to sync and no backend call is made.
    pub async fn reconcile<F>(
        &self,
        id: &SecretId,
        signature: Option<Signature>,
        payload: F,
    ) -> Result<Outcome>
    where
        F: FnOnce() -> Result<SecretPayload>,
    {
        let Some(signature) = signature else {
            debug!(secret = %id, "no content to sync, skipping");
            return Ok(Outcome::Skipped);
        };

        let remote = self.backend.get_signature(id).await?;
        match ReconcileState::assess(&signature, &remote) {
            ReconcileState::UpToDate => {
                debug!(secret = %id, "secret up to date");
                Ok(Outcome::UpToDate)
            }
            ReconcileState::NoRemote => {
                info!(secret = %id, "secret not found, creating");
                let payload = payload()?;
                match self.backend.create(id, &payload).await {
                    Ok(()) => {}
                    Err(SecretError::AlreadyExists(name)) => {
                        warn!(
                            secret = %id,
                            resource = %name,
                            "secret already exists, will reconcile its signature on the next run"
                        );
                        return Ok(Outcome::CreateConflict);
                    }
                    Err(e) => return Err(e),
                }
                self.backend.set_signature(id, &signature).await?;
                Ok(Outcome::Created)
            }
            ReconcileState::Stale => {
                info!(secret = %id, "secret needs updating as signature changed");
                let payload = payload()?;
                self.backend.update(id, &payload).await?;
                self.backend.set_signature(id, &signature).await?;
                Ok(Outcome::Updated)
            }
        }
    }

    /// Reconcile a loaded definition, using `provider` for file-based secrets.
    pub async fn sync_definition(
        &self,
        definition: &SecretDefinition,
        provider: &SecretProvider,
    ) -> Result<Outcome> {
        let signature = signature::compute(definition, provider)?;
        self.reconcile(&definition.id, signature, || payload_for(definition, provider))
            .await
    }
}

/// Produce the payload for a definition.
///
/// Provider secrets hold a single entry keyed by the secret name.
pub fn payload_for(definition: &SecretDefinition, provider: &SecretProvider) -> Result<SecretPayload> {
    match &definition.content {
        SecretContent::Credentials(entries) => Ok(entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()),
        SecretContent::Provider { path, data } => {
            let value = provider.payload_from_data(path, data)?;
            Ok(SecretPayload::single(definition.id.name.clone(), value))
        }
    }
}
