//! Master key resolution for the encrypted provider.
//!
//! The master key is resolved in priority order:
//! 1. `SECRETSYNC_MASTER_KEY` environment variable (hex-encoded)
//! 2. The `key_file` configured for the provider (hex-encoded)

use std::path::Path;

use secretsync_core::env::{self, vars};
use secretsync_core::{paths, SecretBytes};
use tracing::debug;

use crate::crypto::KEY_SIZE;
use crate::error::{Result, SecretError};

/// Load the master key from the environment or from `key_file`.
pub fn load_master_key(key_file: Option<&Path>) -> Result<SecretBytes> {
    resolve_master_key(env::get_var(vars::MASTER_KEY), key_file)
}

fn resolve_master_key(env_value: Option<String>, key_file: Option<&Path>) -> Result<SecretBytes> {
    if let Some(hex_key) = env_value {
        debug!("using master key from environment variable");
        return decode_key(&hex_key, vars::MASTER_KEY);
    }

    let Some(path) = key_file else {
        return Err(SecretError::MasterKey(format!(
            "set {} or configure secret_provider.key_file",
            vars::MASTER_KEY
        )));
    };

    let path = paths::expand_tilde(path);
    debug!(path = %path.display(), "using master key from key file");
    let content = std::fs::read_to_string(&path).map_err(|e| {
        SecretError::MasterKey(format!("cannot read key file {}: {e}", path.display()))
    })?;
    decode_key(&content, &path.display().to_string())
}

fn decode_key(hex_key: &str, source: &str) -> Result<SecretBytes> {
    let key = hex::decode(hex_key.trim())
        .map_err(|e| SecretError::MasterKey(format!("invalid hex in {source}: {e}")))?;
    if key.len() != KEY_SIZE {
        return Err(SecretError::MasterKey(format!(
            "{source} must decode to exactly {KEY_SIZE} bytes, got {}",
            key.len()
        )));
    }
    Ok(SecretBytes::new(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto;
    use tempfile::TempDir;

    #[test]
    fn test_master_key_from_env_value() {
        let key = crypto::generate_master_key();
        let resolved = resolve_master_key(Some(hex::encode(&key)), None).unwrap();
        assert_eq!(resolved.expose(), key.as_slice());
    }

    #[test]
    fn test_env_value_wins_over_key_file() {
        let key = crypto::generate_master_key();
        let resolved =
            resolve_master_key(Some(hex::encode(&key)), Some(Path::new("/nonexistent/key")))
                .unwrap();
        assert_eq!(resolved.expose(), key.as_slice());
    }

    #[test]
    fn test_master_key_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("master.key");
        let key = crypto::generate_master_key();
        std::fs::write(&path, format!("{}\n", hex::encode(&key))).unwrap();

        let resolved = resolve_master_key(None, Some(&path)).unwrap();
        assert_eq!(resolved.expose(), key.as_slice());
    }

    #[test]
    fn test_invalid_hex() {
        let result = resolve_master_key(Some("not-valid-hex!".to_string()), None);
        assert!(matches!(result, Err(SecretError::MasterKey(_))));
    }

    #[test]
    fn test_wrong_length_key() {
        let result = resolve_master_key(Some(hex::encode([0u8; 16])), None);
        assert!(matches!(result, Err(SecretError::MasterKey(_))));
    }

    #[test]
    fn test_no_source_configured() {
        let result = resolve_master_key(None, None);
        assert!(matches!(result, Err(SecretError::MasterKey(_))));
    }

    #[test]
    fn test_missing_key_file() {
        let result = resolve_master_key(None, Some(Path::new("/nonexistent/master.key")));
        assert!(matches!(result, Err(SecretError::MasterKey(_))));
    }
}
