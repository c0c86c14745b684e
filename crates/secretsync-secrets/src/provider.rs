//! Secret content providers.
//!
//! A provider interprets `secrets/<name>.json` definition files: it derives
//! the signature that is compared against the store and produces the payload
//! written on create/update. The set of providers is closed and selected by
//! the tagged `secret_provider` configuration value.
//!
//! Definition formats:
//!
//! ```json
//! // plaintext
//! {"value": "hunter2"}
//!
//! // encrypted
//! {"environments": {"prod": {"ciphertext": "<base64>", "salt": "<hex>", "signature": "<hex>"}}}
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use secretsync_core::config::{ProviderConfig, SystemConfig};
use secretsync_core::SecretBytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto;
use crate::error::{Result, SecretError};
use crate::keys;
use crate::signature::digest;
use crate::types::Signature;

/// The configured secret content provider.
#[derive(Debug)]
pub enum SecretProvider {
    Plaintext(PlaintextProvider),
    Encrypted(EncryptedProvider),
}

impl SecretProvider {
    /// Provider for clear-text definitions.
    pub fn plaintext() -> Self {
        Self::Plaintext(PlaintextProvider)
    }

    /// Build the provider selected in the system config for `cluster`.
    pub fn from_config(config: &SystemConfig, cluster: &str) -> Result<Self> {
        match &config.secret_provider {
            ProviderConfig::Plaintext => Ok(Self::plaintext()),
            ProviderConfig::Encrypted { key_file } => {
                let master_key = keys::load_master_key(key_file.as_deref())?;
                Ok(Self::Encrypted(EncryptedProvider::new(
                    config.ecosystem_for(cluster),
                    master_key,
                )))
            }
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Plaintext(_) => "plaintext",
            Self::Encrypted(_) => "encrypted",
        }
    }

    /// Signature of a parsed definition file, or `None` if it has nothing to sync.
    pub fn signature_from_data(&self, path: &Path, data: &Value) -> Result<Option<Signature>> {
        match self {
            Self::Plaintext(p) => p.signature_from_data(path, data),
            Self::Encrypted(p) => p.signature_from_data(path, data),
        }
    }

    /// Payload bytes of a parsed definition file.
    pub fn payload_from_data(&self, path: &Path, data: &Value) -> Result<SecretBytes> {
        match self {
            Self::Plaintext(p) => p.payload_from_data(path, data),
            Self::Encrypted(p) => p.payload_from_data(path, data),
        }
    }
}

fn parse_definition<T: DeserializeOwned>(path: &Path, data: &Value) -> Result<T> {
    serde_json::from_value(data.clone()).map_err(|e| SecretError::malformed(path, e.to_string()))
}

/// Definitions holding their value in clear text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextProvider;

#[derive(Deserialize)]
struct PlaintextDefinition {
    value: String,
}

impl PlaintextProvider {
    fn signature_from_data(&self, path: &Path, data: &Value) -> Result<Option<Signature>> {
        let definition: PlaintextDefinition = parse_definition(path, data)?;
        if definition.value.is_empty() {
            return Ok(None);
        }
        Ok(Some(digest(definition.value.as_bytes())))
    }

    fn payload_from_data(&self, path: &Path, data: &Value) -> Result<SecretBytes> {
        let definition: PlaintextDefinition = parse_definition(path, data)?;
        Ok(SecretBytes::from(definition.value))
    }
}

/// An encrypted definition file: one sealed value per ecosystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncryptedDefinition {
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentEntry>,
}

/// A value sealed for one ecosystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentEntry {
    /// `nonce || ciphertext || tag`, base64.
    pub ciphertext: String,
    /// HKDF salt, hex.
    pub salt: String,
    /// SHA-256 of the plaintext, hex. Derived by decrypting when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Definitions sealed with AES-256-GCM under a shared master key.
///
/// Sealing is randomized, so the signature always describes the plaintext,
/// never the ciphertext; re-sealing an unchanged value does not trigger an
/// update.
#[derive(Debug)]
pub struct EncryptedProvider {
    ecosystem: String,
    master_key: SecretBytes,
}

impl EncryptedProvider {
    pub fn new(ecosystem: impl Into<String>, master_key: SecretBytes) -> Self {
        Self {
            ecosystem: ecosystem.into(),
            master_key,
        }
    }

    /// Ecosystem whose entries this provider reads.
    pub fn ecosystem(&self) -> &str {
        &self.ecosystem
    }

    /// Seal `plaintext` into an entry for this provider's ecosystem.
    pub fn seal(&self, plaintext: &[u8]) -> Result<EnvironmentEntry> {
        let (ciphertext, salt) =
            crypto::encrypt(self.master_key.expose(), &self.ecosystem, plaintext)?;
        Ok(EnvironmentEntry {
            ciphertext: STANDARD.encode(ciphertext),
            salt: hex::encode(salt),
            signature: Some(digest(plaintext).to_string()),
        })
    }

    fn entry(&self, path: &Path, data: &Value) -> Result<Option<EnvironmentEntry>> {
        let mut definition: EncryptedDefinition = parse_definition(path, data)?;
        Ok(definition.environments.remove(&self.ecosystem))
    }

    fn open(&self, path: &Path, entry: &EnvironmentEntry) -> Result<SecretBytes> {
        let ciphertext = STANDARD
            .decode(entry.ciphertext.trim())
            .map_err(|e| SecretError::malformed(path, format!("ciphertext is not base64: {e}")))?;
        let salt = hex::decode(entry.salt.trim())
            .map_err(|e| SecretError::malformed(path, format!("salt is not hex: {e}")))?;
        let plaintext =
            crypto::decrypt(self.master_key.expose(), &self.ecosystem, &ciphertext, &salt)?;
        Ok(SecretBytes::new(plaintext))
    }

    fn signature_from_data(&self, path: &Path, data: &Value) -> Result<Option<Signature>> {
        let Some(entry) = self.entry(path, data)? else {
            return Ok(None);
        };

        match &entry.signature {
            Some(recorded) => Signature::parse(recorded).map(Some).ok_or_else(|| {
                SecretError::malformed(path, format!("signature for {} is not hex", self.ecosystem))
            }),
            None => {
                let plaintext = self.open(path, &entry)?;
                Ok(Some(digest(plaintext.expose())))
            }
        }
    }

    fn payload_from_data(&self, path: &Path, data: &Value) -> Result<SecretBytes> {
        let entry = self.entry(path, data)?.ok_or_else(|| {
            SecretError::malformed(path, format!("no entry for ecosystem {}", self.ecosystem))
        })?;
        self.open(path, &entry)
    }
}
