//! Core types for secret synchronization.
//!
//! Local definitions are read from disk once per run and turned into a
//! [`Signature`]; the store side is summarized as a [`RemoteState`].

use secretsync_core::SecretBytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Prefix of the names of secrets assembled from credential files.
pub const CREDENTIALS_SECRET_PREFIX: &str = "paasta-boto-key";

/// How a secret's content is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretKind {
    /// A `secrets/<name>.json` definition interpreted by the configured provider.
    Provider,
    /// A bundle of raw credential files listed in the instance config.
    Credentials,
}

/// Identity of a secret within a service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretId {
    pub service: String,
    pub name: String,
    pub kind: SecretKind,
}

impl SecretId {
    /// Identity of a provider-managed secret.
    pub fn provider(service: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            name: name.into(),
            kind: SecretKind::Provider,
        }
    }

    /// Identity of the credential secret for one instance of a service.
    pub fn credentials(service: impl Into<String>, instance: &str) -> Self {
        let service = service.into();
        let name = format!("{CREDENTIALS_SECRET_PREFIX}-{service}-{instance}");
        Self {
            service,
            name,
            kind: SecretKind::Credentials,
        }
    }
}

impl fmt::Display for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} for {}", self.name, self.service)
    }
}

/// Deterministic fingerprint of a secret's desired content (lowercase hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    /// Build a signature from raw digest bytes.
    pub fn from_digest(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    /// Parse a hex signature as recorded in a definition file or the store.
    ///
    /// Returns `None` for empty or non-hex input.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the store currently holds for a secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteState {
    /// No secret object exists.
    Absent,
    /// The object exists but no signature was recorded for it.
    Unsigned,
    /// The object exists with a recorded signature.
    Signed(Signature),
}

/// Data written into a secret object, keyed by data key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretPayload {
    entries: BTreeMap<String, SecretBytes>,
}

impl SecretPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload holding a single entry.
    pub fn single(key: impl Into<String>, value: SecretBytes) -> Self {
        let mut payload = Self::new();
        payload.insert(key, value);
        payload
    }

    pub fn insert(&mut self, key: impl Into<String>, value: SecretBytes) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&SecretBytes> {
        self.entries.get(key)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SecretBytes)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, SecretBytes)> for SecretPayload {
    fn from_iter<T: IntoIterator<Item = (String, SecretBytes)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Local content of a secret.
#[derive(Debug, Clone)]
pub enum SecretContent {
    /// Credential file contents keyed by credential name. Missing files are
    /// already left out.
    Credentials(BTreeMap<String, SecretBytes>),
    /// Parsed definition file, interpreted by the provider.
    Provider {
        path: PathBuf,
        data: serde_json::Value,
    },
}

/// A secret as defined on disk.
#[derive(Debug, Clone)]
pub struct SecretDefinition {
    pub id: SecretId,
    pub content: SecretContent,
}

/// An instance's list of credential keys from the per-cluster instance config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialGroup {
    pub instance: String,
    /// Credential names, sorted.
    pub keys: Vec<String>,
}

/// A `secrets/<name>.json` file found for a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionFile {
    pub name: String,
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_id_name() {
        let id = SecretId::credentials("foo", "main");
        assert_eq!(id.name, "paasta-boto-key-foo-main");
        assert_eq!(id.kind, SecretKind::Credentials);
        assert_eq!(id.to_string(), "paasta-boto-key-foo-main for foo");
    }

    #[test]
    fn test_signature_parse() {
        assert_eq!(Signature::parse("ABcd01").unwrap().as_str(), "abcd01");
        assert!(Signature::parse("").is_none());
        assert!(Signature::parse("not-hex").is_none());
    }

    #[test]
    fn test_signature_from_digest() {
        assert_eq!(Signature::from_digest(&[0xde, 0xad]).as_str(), "dead");
    }

    #[test]
    fn test_payload_debug_is_redacted() {
        let payload = SecretPayload::single("token", SecretBytes::from("hunter2"));
        let debug = format!("{:?}", payload);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("token"));
    }

    #[test]
    fn test_payload_iterates_in_key_order() {
        let payload: SecretPayload = vec![
            ("b".to_string(), SecretBytes::from("2")),
            ("a".to_string(), SecretBytes::from("1")),
        ]
        .into_iter()
        .collect();
        let keys: Vec<&str> = payload.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
