//! File-system-backed secret store.
//!
//! Mirrors the layout of a cluster store on local disk: each secret object is
//! a JSON file under `{base_dir}/secrets/` and each signature record a JSON
//! file under `{base_dir}/signatures/`. Useful for dry runs and for testing
//! the whole pipeline without a cluster.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::SecretBackend;
use crate::error::{Result, SecretError};
use crate::naming::{
    secret_resource_name, signature_resource_name, validate_data_key, validate_resource_name,
    SERVICE_LABEL,
};
use crate::types::{RemoteState, SecretId, SecretPayload, Signature};

/// On-disk representation of a secret object.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSecret {
    /// Labels attached to the object.
    labels: BTreeMap<String, String>,
    /// Payload entries, base64-encoded.
    data: BTreeMap<String, String>,
    /// When the object was first created.
    created_at: DateTime<Utc>,
    /// When the payload was last written.
    updated_at: DateTime<Utc>,
}

/// On-disk representation of a signature record.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSignature {
    signature: Signature,
    updated_at: DateTime<Utc>,
}

/// A secret store rooted at a local directory.
///
/// Files are created with mode `0600` and directories with `0700` on Unix.
#[derive(Debug, Clone)]
pub struct DirectoryBackend {
    base_dir: PathBuf,
}

impl DirectoryBackend {
    /// Create a store rooted at `base_dir`.
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn secrets_dir(&self) -> PathBuf {
        self.base_dir.join("secrets")
    }

    fn signatures_dir(&self) -> PathBuf {
        self.base_dir.join("signatures")
    }

    /// Resolve the path for a secret object file.
    fn secret_path(&self, id: &SecretId) -> Result<PathBuf> {
        let name = secret_resource_name(id);
        validate_resource_name(&name)?;
        Ok(self.secrets_dir().join(format!("{name}.json")))
    }

    /// Resolve the path for a signature record file.
    fn signature_path(&self, id: &SecretId) -> Result<PathBuf> {
        let name = signature_resource_name(id);
        validate_resource_name(&name)?;
        Ok(self.signatures_dir().join(format!("{name}.json")))
    }

    async fn write_secret(
        &self,
        id: &SecretId,
        path: &Path,
        payload: &SecretPayload,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut data = BTreeMap::new();
        for (key, value) in payload.iter() {
            validate_data_key(key)?;
            data.insert(key.to_string(), STANDARD.encode(value.expose()));
        }

        let stored = StoredSecret {
            labels: BTreeMap::from([(SERVICE_LABEL.to_string(), id.service.clone())]),
            data,
            created_at,
            updated_at: Utc::now(),
        };

        ensure_dir(&self.secrets_dir()).await?;
        let json = serde_json::to_string_pretty(&stored)?;
        debug!(secret = %id, path = %path.display(), "writing secret");
        write_private_file(path, json.as_bytes()).await
    }
}

/// Ensure a directory exists with restrictive permissions.
async fn ensure_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        tokio::fs::set_permissions(dir, perms).await?;
    }

    Ok(())
}

/// Write `data` to `path` with mode 0600 on Unix.
///
/// Writes go to a sibling temp file first so readers never see a torn file.
async fn write_private_file(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, data).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms).await?;
    }

    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read_to_string(path).await {
        Ok(data) => serde_json::from_str(&data).map(Some).map_err(|e| {
            SecretError::Backend(format!("corrupt store file {}: {e}", path.display()))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl SecretBackend for DirectoryBackend {
    async fn get_signature(&self, id: &SecretId) -> Result<RemoteState> {
        if let Some(stored) = read_json::<StoredSignature>(&self.signature_path(id)?).await? {
            return Ok(RemoteState::Signed(stored.signature));
        }
        if tokio::fs::try_exists(self.secret_path(id)?).await? {
            Ok(RemoteState::Unsigned)
        } else {
            Ok(RemoteState::Absent)
        }
    }

    async fn create(&self, id: &SecretId, payload: &SecretPayload) -> Result<()> {
        let path = self.secret_path(id)?;
        if tokio::fs::try_exists(&path).await? {
            return Err(SecretError::AlreadyExists(secret_resource_name(id)));
        }
        self.write_secret(id, &path, payload, Utc::now()).await
    }

    async fn update(&self, id: &SecretId, payload: &SecretPayload) -> Result<()> {
        let path = self.secret_path(id)?;
        let Some(existing) = read_json::<StoredSecret>(&path).await? else {
            return Err(SecretError::Backend(format!(
                "{} does not exist",
                secret_resource_name(id)
            )));
        };
        self.write_secret(id, &path, payload, existing.created_at).await
    }

    async fn set_signature(&self, id: &SecretId, signature: &Signature) -> Result<()> {
        let path = self.signature_path(id)?;
        let stored = StoredSignature {
            signature: signature.clone(),
            updated_at: Utc::now(),
        };

        ensure_dir(&self.signatures_dir()).await?;
        let json = serde_json::to_string_pretty(&stored)?;
        debug!(secret = %id, path = %path.display(), "writing signature");
        write_private_file(&path, json.as_bytes()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secretsync_core::SecretBytes;
    use tempfile::TempDir;

    fn test_store() -> (DirectoryBackend, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = DirectoryBackend::new(tmp.path().to_path_buf());
        (store, tmp)
    }

    fn payload(value: &str) -> SecretPayload {
        SecretPayload::single("db_password", SecretBytes::from(value))
    }

    #[tokio::test]
    async fn test_absent_then_unsigned_then_signed() {
        let (store, _tmp) = test_store();
        let id = SecretId::provider("web", "db_password");

        assert_eq!(store.get_signature(&id).await.unwrap(), RemoteState::Absent);

        store.create(&id, &payload("v1")).await.unwrap();
        assert_eq!(store.get_signature(&id).await.unwrap(), RemoteState::Unsigned);

        let sig = Signature::parse("0123abcd").unwrap();
        store.set_signature(&id, &sig).await.unwrap();
        assert_eq!(
            store.get_signature(&id).await.unwrap(),
            RemoteState::Signed(sig)
        );
    }

    #[tokio::test]
    async fn test_create_conflict() {
        let (store, _tmp) = test_store();
        let id = SecretId::provider("web", "db_password");

        store.create(&id, &payload("v1")).await.unwrap();
        let result = store.create(&id, &payload("v2")).await;
        assert!(matches!(result, Err(SecretError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_update_replaces_payload_and_keeps_created_at() {
        let (store, _tmp) = test_store();
        let id = SecretId::provider("web", "db_password");

        store.create(&id, &payload("v1")).await.unwrap();
        let path = store.secret_path(&id).unwrap();
        let before: StoredSecret = read_json(&path).await.unwrap().unwrap();

        store.update(&id, &payload("v2")).await.unwrap();
        let after: StoredSecret = read_json(&path).await.unwrap().unwrap();

        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.data["db_password"], STANDARD.encode("v2"));
        assert_eq!(after.labels[SERVICE_LABEL], "web");
    }

    #[tokio::test]
    async fn test_update_missing() {
        let (store, _tmp) = test_store();
        let id = SecretId::provider("web", "db_password");
        let result = store.update(&id, &payload("v1")).await;
        assert!(matches!(result, Err(SecretError::Backend(_))));
    }

    #[tokio::test]
    async fn test_invalid_data_key_rejected() {
        let (store, _tmp) = test_store();
        let id = SecretId::provider("web", "db");
        let bad = SecretPayload::single("../escape", SecretBytes::from("x"));
        let result = store.create(&id, &bad).await;
        assert!(matches!(result, Err(SecretError::InvalidName(_))));
    }

    #[tokio::test]
    async fn test_corrupt_signature_file() {
        let (store, _tmp) = test_store();
        let id = SecretId::provider("web", "db");
        ensure_dir(&store.signatures_dir()).await.unwrap();
        tokio::fs::write(store.signature_path(&id).unwrap(), "{not json")
            .await
            .unwrap();

        let result = store.get_signature(&id).await;
        assert!(matches!(result, Err(SecretError::Backend(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (store, _tmp) = test_store();
        let id = SecretId::provider("web", "perm_test");
        store.create(&id, &payload("value")).await.unwrap();

        let path = store.secret_path(&id).unwrap();
        let metadata = tokio::fs::metadata(&path).await.unwrap();
        let mode = metadata.permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "secret file should have 0600 permissions");
    }
}
