//! Names of store objects derived from secret identities.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, SecretError};
use crate::types::{SecretId, SecretKind};

/// Label carrying the owning service on every secret object.
pub const SERVICE_LABEL: &str = "yelp.com/paasta_service";

/// Prefix of provider-managed secret objects and of all signature records.
const SECRET_PREFIX: &str = "paasta-secret";

/// Longest object name the store accepts.
const MAX_RESOURCE_NAME_LEN: usize = 253;

static RESOURCE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("resource name pattern is valid")
});

static DATA_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-._a-zA-Z0-9]+$").expect("data key pattern is valid"));

/// Make a service or secret name usable as part of an object name.
///
/// Underscores become `--` and a resulting leading `--` becomes
/// `underscore-`; the result is lowercased.
pub fn sanitise_name(name: &str) -> String {
    let name = name.replace('_', "--");
    let name = match name.strip_prefix("--") {
        Some(rest) => format!("underscore-{rest}"),
        None => name,
    };
    name.to_lowercase()
}

/// Name of the secret object holding a secret's payload.
pub fn secret_resource_name(id: &SecretId) -> String {
    match id.kind {
        SecretKind::Provider => format!(
            "{SECRET_PREFIX}-{}-{}",
            sanitise_name(&id.service),
            sanitise_name(&id.name)
        ),
        SecretKind::Credentials => sanitise_name(&id.name),
    }
}

/// Name of the object recording a secret's signature.
pub fn signature_resource_name(id: &SecretId) -> String {
    format!(
        "{SECRET_PREFIX}-{}-{}-signature",
        sanitise_name(&id.service),
        sanitise_name(&id.name)
    )
}

/// Reject object names the store would refuse.
pub fn validate_resource_name(name: &str) -> Result<()> {
    if name.len() > MAX_RESOURCE_NAME_LEN {
        return Err(SecretError::InvalidName(format!(
            "{name} exceeds maximum length of {MAX_RESOURCE_NAME_LEN} characters"
        )));
    }
    if !RESOURCE_NAME.is_match(name) {
        return Err(SecretError::InvalidName(format!(
            "{name} is not a valid object name (lowercase alphanumeric, '-' and '.')"
        )));
    }
    Ok(())
}

/// Reject payload keys the store would refuse.
pub fn validate_data_key(key: &str) -> Result<()> {
    if !DATA_KEY.is_match(key) {
        return Err(SecretError::InvalidName(format!(
            "{key} is not a valid data key (alphanumeric, '-', '_' and '.')"
        )));
    }
    Ok(())
}
