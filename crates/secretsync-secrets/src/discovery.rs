//! Discovery of a service's secret definitions on disk.

use std::collections::BTreeMap;
use std::path::Path;

use secretsync_core::{paths, SecretBytes};
use serde::Deserialize;
use serde_yaml::Value as YamlValue;
use tracing::{debug, warn};

use crate::error::{Result, SecretError};
use crate::naming::validate_data_key;
use crate::types::{
    CredentialGroup, DefinitionFile, SecretContent, SecretDefinition, SecretId,
};

const MERGE_KEY: &str = "<<";

/// List a service's `secrets/*.json` definition files, sorted by name.
///
/// Returns `None` when the service has no secrets directory at all.
pub async fn definition_files(soa_dir: &Path, service: &str) -> Result<Option<Vec<DefinitionFile>>> {
    let dir = paths::secrets_dir(soa_dir, service);
    if !tokio::fs::metadata(&dir).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Ok(None);
    }

    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(&dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        // `metadata` follows symlinks.
        if !tokio::fs::metadata(&path).await?.is_file() {
            debug!(path = %path.display(), "skipping non-file definition entry");
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!(path = %path.display(), "skipping definition with non UTF-8 name");
            continue;
        };
        files.push(DefinitionFile {
            name: name.to_string(),
            path,
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Some(files))
}

#[derive(Debug, Default, Deserialize)]
struct InstanceConfig {
    #[serde(default)]
    boto_keys: Vec<String>,
}

/// Read credential groups from the per-cluster instance config.
///
/// Instances whose name starts with `_` are templates and ignored, as are
/// instances without credential keys. A missing file yields no groups.
pub async fn credential_groups(
    soa_dir: &Path,
    service: &str,
    cluster: &str,
) -> Result<Vec<CredentialGroup>> {
    let path = paths::instance_config_file(soa_dir, service, cluster);
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no instance config");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };
    parse_credential_groups(&path, &content)
}

fn parse_credential_groups(path: &Path, content: &str) -> Result<Vec<CredentialGroup>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let malformed = |reason: String| SecretError::MalformedInstanceConfig {
        path: path.to_path_buf(),
        reason,
    };

    let instances: BTreeMap<String, YamlValue> =
        serde_yaml::from_str(content).map_err(|e| malformed(e.to_string()))?;

    let mut groups = Vec::new();
    for (instance, value) in instances {
        if instance.starts_with('_') || value.is_null() {
            continue;
        }
        let config: InstanceConfig = serde_yaml::from_value(with_merged_keys(value))
            .map_err(|e| malformed(format!("instance {instance}: {e}")))?;
        if config.boto_keys.is_empty() {
            continue;
        }

        for key in &config.boto_keys {
            check_credential_key(key)
                .map_err(|e| malformed(format!("instance {instance}: {e}")))?;
        }

        let mut keys = config.boto_keys;
        keys.sort();
        keys.dedup();
        groups.push(CredentialGroup { instance, keys });
    }
    Ok(groups)
}

/// A credential key names a file directly inside the credentials directory.
fn check_credential_key(key: &str) -> Result<()> {
    if key == "." || key == ".." {
        return Err(SecretError::InvalidName(format!(
            "{key} is not a valid credential key"
        )));
    }
    validate_data_key(key)
}

/// Fold `<<: *template` entries into the mapping, keeping explicit keys.
fn with_merged_keys(value: YamlValue) -> YamlValue {
    let YamlValue::Mapping(mut mapping) = value else {
        return value;
    };
    let Some(merged) = mapping.remove(MERGE_KEY) else {
        return YamlValue::Mapping(mapping);
    };

    let sources = match merged {
        YamlValue::Sequence(items) => items,
        other => vec![other],
    };
    for source in sources {
        if let YamlValue::Mapping(source) = source {
            for (key, value) in source {
                if !mapping.contains_key(&key) {
                    mapping.insert(key, value);
                }
            }
        }
    }
    YamlValue::Mapping(mapping)
}

/// Read and parse one definition file.
pub async fn load_definition(service: &str, file: &DefinitionFile) -> Result<SecretDefinition> {
    let content = tokio::fs::read_to_string(&file.path).await?;
    let data = serde_json::from_str(&content)
        .map_err(|e| SecretError::malformed(&file.path, e.to_string()))?;
    Ok(SecretDefinition {
        id: SecretId::provider(service, &file.name),
        content: SecretContent::Provider {
            path: file.path.clone(),
            data,
        },
    })
}

/// Assemble the credential secret for one instance.
///
/// Unreadable credential files are left out with a warning; the caller skips
/// the secret when nothing could be read.
pub async fn load_credentials(
    service: &str,
    group: &CredentialGroup,
    credentials_dir: &Path,
) -> SecretDefinition {
    let mut entries = BTreeMap::new();
    for key in &group.keys {
        if let Err(e) = check_credential_key(key) {
            warn!(service, instance = %group.instance, "skipping credential: {e}");
            continue;
        }
        let path = paths::credential_file(credentials_dir, key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                entries.insert(key.clone(), SecretBytes::new(bytes));
            }
            Err(e) => {
                warn!(
                    service,
                    instance = %group.instance,
                    key = %key,
                    path = %path.display(),
                    "credential file unavailable, leaving it out: {e}"
                );
            }
        }
    }

    SecretDefinition {
        id: SecretId::credentials(service, &group.instance),
        content: SecretContent::Credentials(entries),
    }
}
