//! AES-256-GCM sealing of secret definitions with HKDF-SHA256 key derivation.
//!
//! Each sealed value gets a unique random salt; the master key is never used
//! directly as a cipher key. A fresh random nonce is prepended to the
//! ciphertext so a definition only needs to carry (ciphertext, salt).
//! Ciphertext is therefore different every time the same plaintext is sealed.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;

use crate::error::{Result, SecretError};

const NONCE_SIZE: usize = 12;
const SALT_SIZE: usize = 32;

/// Length of the master key and of derived cipher keys.
pub const KEY_SIZE: usize = 32;

/// HKDF info string used to domain-separate derived keys.
const HKDF_INFO: &[u8] = b"secretsync-definition-v1";

/// Derive a 256-bit cipher key for one ecosystem from `master_key` and `salt`.
fn derive_key(master_key: &[u8], salt: &[u8], ecosystem: &str) -> Result<[u8; KEY_SIZE]> {
    let hk = Hkdf::<Sha256>::new(Some(salt), master_key);
    let mut info = Vec::with_capacity(HKDF_INFO.len() + 1 + ecosystem.len());
    info.extend_from_slice(HKDF_INFO);
    info.push(b':');
    info.extend_from_slice(ecosystem.as_bytes());

    let mut okm = [0u8; KEY_SIZE];
    hk.expand(&info, &mut okm)
        .map_err(|e| SecretError::EncryptionFailed(format!("key derivation failed: {e}")))?;
    Ok(okm)
}

/// Seal `plaintext` for `ecosystem` using a key derived from `master_key`.
///
/// Returns `(nonce || ciphertext_with_tag, salt)`. The ecosystem name is bound
/// as associated data, so a value sealed for one ecosystem cannot be opened
/// as another's.
pub fn encrypt(master_key: &[u8], ecosystem: &str, plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut salt = vec![0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let key = derive_key(master_key, &salt, ecosystem)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| SecretError::EncryptionFailed(e.to_string()))?;

    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: ecosystem.as_bytes(),
            },
        )
        .map_err(|e| SecretError::EncryptionFailed(e.to_string()))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);

    Ok((result, salt))
}

/// Open data previously produced by [`encrypt`] for the same ecosystem.
pub fn decrypt(master_key: &[u8], ecosystem: &str, encrypted: &[u8], salt: &[u8]) -> Result<Vec<u8>> {
    if encrypted.len() < NONCE_SIZE {
        return Err(SecretError::DecryptionFailed(
            "ciphertext too short".to_string(),
        ));
    }

    let (nonce_bytes, ciphertext) = encrypted.split_at(NONCE_SIZE);

    let key = derive_key(master_key, salt, ecosystem)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| SecretError::DecryptionFailed(e.to_string()))?;

    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad: ecosystem.as_bytes(),
            },
        )
        .map_err(|e| SecretError::DecryptionFailed(e.to_string()))
}

/// Generate a new random 256-bit master key.
pub fn generate_master_key() -> Vec<u8> {
    let mut key = vec![0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut key);
    key
}
