//! Signature computation for local secret definitions.
//!
//! Signatures are SHA-256 digests rendered as lowercase hex. They are pure
//! functions of the definition content, so comparing them against the store
//! detects drift without reading remote payloads back.

use std::collections::BTreeMap;

use secretsync_core::SecretBytes;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::provider::SecretProvider;
use crate::types::{SecretContent, SecretDefinition, Signature};

/// Digest arbitrary bytes.
pub fn digest(bytes: &[u8]) -> Signature {
    Signature::from_digest(&Sha256::digest(bytes))
}

/// Signature of a credential bundle.
///
/// Values are concatenated in lexicographic key order before hashing. The
/// order is part of the stored signature format: changing it would make every
/// existing secret look stale. Returns `None` for an empty bundle.
pub fn credentials_signature(entries: &BTreeMap<String, SecretBytes>) -> Option<Signature> {
    if entries.is_empty() {
        return None;
    }

    let mut hasher = Sha256::new();
    for value in entries.values() {
        hasher.update(value.expose());
    }
    Some(Signature::from_digest(&hasher.finalize()))
}

/// Signature of a definition's desired content.
///
/// `Ok(None)` means the definition has nothing to sync.
pub fn compute(definition: &SecretDefinition, provider: &SecretProvider) -> Result<Option<Signature>> {
    match &definition.content {
        SecretContent::Credentials(entries) => Ok(credentials_signature(entries)),
        SecretContent::Provider { path, data } => provider.signature_from_data(path, data),
    }
}
