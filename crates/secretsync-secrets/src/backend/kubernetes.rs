//! Kubernetes secret store.
//!
//! Payloads live in `Secret` objects and signatures in companion `ConfigMap`
//! objects (`data.signature`), both in a single namespace. Talks to the API
//! server over plain REST with a bearer token.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, Method, Response, StatusCode};
use secretsync_core::config::KubernetesStoreConfig;
use secretsync_core::env::{self, vars};
use secretsync_core::ConfigError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::SecretBackend;
use crate::error::{Result, SecretError};
use crate::naming::{
    secret_resource_name, signature_resource_name, validate_data_key, validate_resource_name,
    SERVICE_LABEL,
};
use crate::types::{RemoteState, SecretId, SecretPayload, Signature};

/// Key of the signature inside the signature config map.
const SIGNATURE_KEY: &str = "signature";

/// Longest error body echoed into an error message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ObjectMeta {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SecretObject {
    api_version: &'static str,
    kind: &'static str,
    metadata: ObjectMeta,
    #[serde(rename = "type")]
    secret_type: &'static str,
    data: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigMapObject {
    #[serde(default = "config_map_api_version")]
    api_version: String,
    #[serde(default = "config_map_kind")]
    kind: String,
    metadata: ObjectMeta,
    #[serde(default)]
    data: BTreeMap<String, String>,
}

fn config_map_api_version() -> String {
    "v1".to_string()
}

fn config_map_kind() -> String {
    "ConfigMap".to_string()
}

/// Secret store backed by the Kubernetes API.
pub struct KubernetesBackend {
    client: Client,
    api_server: String,
    token: String,
    namespace: String,
}

impl KubernetesBackend {
    /// Create a backend talking to `api_server` with a bearer `token`.
    pub fn new(
        api_server: impl Into<String>,
        token: impl Into<String>,
        namespace: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SecretError::Backend(format!("failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(client, api_server, token, namespace))
    }

    fn with_client(
        client: Client,
        api_server: impl Into<String>,
        token: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_server: api_server.into().trim_end_matches('/').to_string(),
            token: token.into(),
            namespace: namespace.into(),
        }
    }

    /// Build a backend from store settings, defaulting to in-cluster access.
    pub async fn from_config(config: &KubernetesStoreConfig) -> Result<Self> {
        let api_server = match &config.api_server {
            Some(server) => server.clone(),
            None => {
                let host = env::get_var(vars::KUBERNETES_SERVICE_HOST).ok_or_else(|| {
                    ConfigError::Validation(format!(
                        "{} is not set; configure secret_store.api_server",
                        vars::KUBERNETES_SERVICE_HOST
                    ))
                })?;
                let port = env::get_var_or(vars::KUBERNETES_SERVICE_PORT, "443");
                format!("https://{host}:{port}")
            }
        };

        let token = tokio::fs::read_to_string(&config.token_file)
            .await
            .map_err(|e| {
                SecretError::Backend(format!(
                    "cannot read token file {}: {e}",
                    config.token_file.display()
                ))
            })?;

        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_secs));
        if tokio::fs::try_exists(&config.ca_file).await? {
            let pem = tokio::fs::read(&config.ca_file).await?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                SecretError::Backend(format!(
                    "invalid CA bundle {}: {e}",
                    config.ca_file.display()
                ))
            })?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder
            .build()
            .map_err(|e| SecretError::Backend(format!("failed to create HTTP client: {e}")))?;

        debug!(api_server = %api_server, namespace = %config.namespace, "using kubernetes secret store");
        Ok(Self::with_client(
            client,
            api_server,
            token.trim(),
            config.namespace.clone(),
        ))
    }

    fn collection_url(&self, resource: &str) -> String {
        format!(
            "{}/api/v1/namespaces/{}/{}",
            self.api_server, self.namespace, resource
        )
    }

    fn object_url(&self, resource: &str, name: &str) -> String {
        format!("{}/{}", self.collection_url(resource), name)
    }

    async fn request<T: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: Option<&T>,
    ) -> Result<Response> {
        debug!(%method, url, "kubernetes request");
        let mut builder = self
            .client
            .request(method.clone(), url)
            .bearer_auth(&self.token);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder
            .send()
            .await
            .map_err(|e| SecretError::Backend(format!("{method} {url} failed: {e}")))
    }

    async fn exists(&self, resource: &str, name: &str) -> Result<bool> {
        let url = self.object_url(resource, name);
        let response = self.request::<()>(Method::GET, &url, None).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            _ => Err(unexpected(Method::GET, &url, response).await),
        }
    }

    fn secret_object(&self, id: &SecretId, payload: &SecretPayload) -> Result<SecretObject> {
        let name = secret_resource_name(id);
        validate_resource_name(&name)?;

        let mut data = BTreeMap::new();
        for (key, value) in payload.iter() {
            validate_data_key(key)?;
            data.insert(key.to_string(), STANDARD.encode(value.expose()));
        }

        Ok(SecretObject {
            api_version: "v1",
            kind: "Secret",
            metadata: ObjectMeta {
                name,
                namespace: Some(self.namespace.clone()),
                labels: BTreeMap::from([(SERVICE_LABEL.to_string(), id.service.clone())]),
            },
            secret_type: "Opaque",
            data,
        })
    }
}

async fn unexpected(method: Method, url: &str, response: Response) -> SecretError {
    let status = response.status();
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    SecretError::Backend(format!("{method} {url} returned {status}: {body}"))
}

#[async_trait]
impl SecretBackend for KubernetesBackend {
    async fn get_signature(&self, id: &SecretId) -> Result<RemoteState> {
        let name = signature_resource_name(id);
        validate_resource_name(&name)?;
        let url = self.object_url("configmaps", &name);

        let response = self.request::<()>(Method::GET, &url, None).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return if self.exists("secrets", &secret_resource_name(id)).await? {
                Ok(RemoteState::Unsigned)
            } else {
                Ok(RemoteState::Absent)
            };
        }
        if !status.is_success() {
            return Err(unexpected(Method::GET, &url, response).await);
        }

        let config_map: ConfigMapObject = response
            .json()
            .await
            .map_err(|e| SecretError::Backend(format!("invalid config map {name}: {e}")))?;
        Ok(config_map
            .data
            .get(SIGNATURE_KEY)
            .and_then(|s| Signature::parse(s))
            .map_or(RemoteState::Unsigned, RemoteState::Signed))
    }

    async fn create(&self, id: &SecretId, payload: &SecretPayload) -> Result<()> {
        let object = self.secret_object(id, payload)?;
        let url = self.collection_url("secrets");

        let response = self.request(Method::POST, &url, Some(&object)).await?;
        match response.status() {
            StatusCode::CONFLICT => Err(SecretError::AlreadyExists(object.metadata.name)),
            s if s.is_success() => Ok(()),
            _ => Err(unexpected(Method::POST, &url, response).await),
        }
    }

    async fn update(&self, id: &SecretId, payload: &SecretPayload) -> Result<()> {
        let object = self.secret_object(id, payload)?;
        let url = self.object_url("secrets", &object.metadata.name);

        let response = self.request(Method::PUT, &url, Some(&object)).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(unexpected(Method::PUT, &url, response).await)
        }
    }

    async fn set_signature(&self, id: &SecretId, signature: &Signature) -> Result<()> {
        let name = signature_resource_name(id);
        validate_resource_name(&name)?;
        let config_map = ConfigMapObject {
            api_version: config_map_api_version(),
            kind: config_map_kind(),
            metadata: ObjectMeta {
                name: name.clone(),
                namespace: Some(self.namespace.clone()),
                labels: BTreeMap::from([(SERVICE_LABEL.to_string(), id.service.clone())]),
            },
            data: BTreeMap::from([(SIGNATURE_KEY.to_string(), signature.to_string())]),
        };

        let url = self.collection_url("configmaps");
        let response = self.request(Method::POST, &url, Some(&config_map)).await?;
        match response.status() {
            s if s.is_success() => return Ok(()),
            StatusCode::CONFLICT => {}
            _ => return Err(unexpected(Method::POST, &url, response).await),
        }

        let url = self.object_url("configmaps", &name);
        let response = self.request(Method::PUT, &url, Some(&config_map)).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(unexpected(Method::PUT, &url, response).await)
        }
    }
}
