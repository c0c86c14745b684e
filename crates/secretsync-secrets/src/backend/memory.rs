//! In-process secret store that records every call.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::SecretBackend;
use crate::error::{Result, SecretError};
use crate::naming::secret_resource_name;
use crate::types::{RemoteState, SecretId, SecretPayload, Signature};

/// A call made against an [`InMemoryBackend`], by secret object name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    GetSignature(String),
    Create(String),
    Update(String),
    SetSignature(String, Signature),
}

impl BackendCall {
    /// Whether the call changes store state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::GetSignature(_))
    }
}

#[derive(Debug, Clone)]
struct StoredSecret {
    payload: SecretPayload,
    signature: Option<Signature>,
}

#[derive(Debug, Default)]
struct State {
    secrets: BTreeMap<String, StoredSecret>,
    calls: Vec<BackendCall>,
    racing: HashSet<String>,
    failing: HashSet<String>,
}

/// Secret store held in memory.
///
/// Besides storing secrets it keeps a log of [`BackendCall`]s and can be told
/// to lose a create race or to fail every call for a given secret.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }

    /// Only the calls that changed store state.
    pub fn mutations(&self) -> Vec<BackendCall> {
        self.calls().into_iter().filter(BackendCall::is_mutation).collect()
    }

    /// Forget the call log, keeping stored secrets.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Signature recorded for a secret.
    pub fn signature_of(&self, id: &SecretId) -> Option<Signature> {
        self.state
            .lock()
            .secrets
            .get(&secret_resource_name(id))
            .and_then(|s| s.signature.clone())
    }

    /// Payload stored for a secret.
    pub fn payload_of(&self, id: &SecretId) -> Option<SecretPayload> {
        self.state
            .lock()
            .secrets
            .get(&secret_resource_name(id))
            .map(|s| s.payload.clone())
    }

    /// Store a secret directly, bypassing the call log.
    pub fn insert(&self, id: &SecretId, payload: SecretPayload, signature: Option<Signature>) {
        self.state
            .lock()
            .secrets
            .insert(secret_resource_name(id), StoredSecret { payload, signature });
    }

    /// Make the next `create` for `id` find that another writer created the
    /// object first (empty payload, no signature).
    pub fn lose_create_race(&self, id: &SecretId) {
        self.state.lock().racing.insert(secret_resource_name(id));
    }

    /// Make every call for `id` fail with a backend error.
    pub fn fail_on(&self, id: &SecretId) {
        self.state.lock().failing.insert(secret_resource_name(id));
    }

    fn record(&self, call: BackendCall, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.failing.contains(name) {
            return Err(SecretError::Backend(format!("injected failure for {name}")));
        }
        Ok(())
    }
}

#[async_trait]
impl SecretBackend for InMemoryBackend {
    async fn get_signature(&self, id: &SecretId) -> Result<RemoteState> {
        let name = secret_resource_name(id);
        self.record(BackendCall::GetSignature(name.clone()), &name)?;

        let state = self.state.lock();
        Ok(match state.secrets.get(&name) {
            None => RemoteState::Absent,
            Some(StoredSecret {
                signature: None, ..
            }) => RemoteState::Unsigned,
            Some(StoredSecret {
                signature: Some(sig),
                ..
            }) => RemoteState::Signed(sig.clone()),
        })
    }

    async fn create(&self, id: &SecretId, payload: &SecretPayload) -> Result<()> {
        let name = secret_resource_name(id);
        self.record(BackendCall::Create(name.clone()), &name)?;

        let mut state = self.state.lock();
        if state.racing.remove(&name) {
            state.secrets.insert(
                name.clone(),
                StoredSecret {
                    payload: SecretPayload::new(),
                    signature: None,
                },
            );
        }
        if state.secrets.contains_key(&name) {
            return Err(SecretError::AlreadyExists(name));
        }
        state.secrets.insert(
            name,
            StoredSecret {
                payload: payload.clone(),
                signature: None,
            },
        );
        Ok(())
    }

    async fn update(&self, id: &SecretId, payload: &SecretPayload) -> Result<()> {
        let name = secret_resource_name(id);
        self.record(BackendCall::Update(name.clone()), &name)?;

        let mut state = self.state.lock();
        match state.secrets.get_mut(&name) {
            Some(stored) => {
                stored.payload = payload.clone();
                Ok(())
            }
            None => Err(SecretError::Backend(format!("{name} does not exist"))),
        }
    }

    async fn set_signature(&self, id: &SecretId, signature: &Signature) -> Result<()> {
        let name = secret_resource_name(id);
        self.record(BackendCall::SetSignature(name.clone(), signature.clone()), &name)?;

        let mut state = self.state.lock();
        match state.secrets.get_mut(&name) {
            Some(stored) => {
                stored.signature = Some(signature.clone());
                Ok(())
            }
            None => Err(SecretError::Backend(format!("{name} does not exist"))),
        }
    }
}
