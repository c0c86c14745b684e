//! Syncing encrypted definitions through the whole pipeline.

use std::sync::Arc;

use secretsync_core::SecretBytes;
use secretsync_integration_tests::{services, SoaFixture};
use secretsync_secrets::backend::{BackendCall, InMemoryBackend};
use secretsync_secrets::crypto::generate_master_key;
use secretsync_secrets::provider::EncryptedProvider;
use secretsync_secrets::{sync_service, Outcome, SecretError, SecretId, SecretProvider};
use serde_json::json;

fn write_sealed(fx: &SoaFixture, sealer: &EncryptedProvider, relative: &str, plaintext: &str) {
    let entry = sealer.seal(plaintext.as_bytes()).unwrap();
    let definition = json!({ "environments": { sealer.ecosystem(): entry } });
    fx.write(relative, &definition.to_string());
}

fn providers(key: &[u8]) -> (EncryptedProvider, SecretProvider) {
    (
        EncryptedProvider::new("dev", SecretBytes::from(key.to_vec())),
        SecretProvider::Encrypted(EncryptedProvider::new("dev", SecretBytes::from(key.to_vec()))),
    )
}

#[tokio::test]
async fn test_encrypted_secret_created_with_decrypted_payload() {
    let fx = SoaFixture::new();
    let (sealer, provider) = providers(&generate_master_key());
    write_sealed(&fx, &sealer, "soa/web/secrets/api_key.json", "s3cret");
    let backend = Arc::new(InMemoryBackend::new());
    let ctx = fx.context(provider, backend.clone());

    let report = sync_service(&ctx, "web").await;
    assert!(report.success());
    assert_eq!(report.count(Outcome::Created), 1);

    let stored = backend.payload_of(&SecretId::provider("web", "api_key")).unwrap();
    assert_eq!(stored.get("api_key").unwrap().expose(), b"s3cret");
}

#[tokio::test]
async fn test_reseal_of_same_value_does_not_update() {
    let fx = SoaFixture::new();
    let (sealer, provider) = providers(&generate_master_key());
    write_sealed(&fx, &sealer, "soa/web/secrets/api_key.json", "s3cret");
    let backend = Arc::new(InMemoryBackend::new());
    let ctx = fx.context(provider, backend.clone());
    sync_service(&ctx, "web").await;

    write_sealed(&fx, &sealer, "soa/web/secrets/api_key.json", "s3cret");
    backend.clear_calls();
    let report = sync_service(&ctx, "web").await;

    assert_eq!(report.count(Outcome::UpToDate), 1);
    assert!(backend.mutations().is_empty());
}

#[tokio::test]
async fn test_changed_value_updates_payload() {
    let fx = SoaFixture::new();
    let (sealer, provider) = providers(&generate_master_key());
    write_sealed(&fx, &sealer, "soa/web/secrets/api_key.json", "old");
    let backend = Arc::new(InMemoryBackend::new());
    let ctx = fx.context(provider, backend.clone());
    sync_service(&ctx, "web").await;

    write_sealed(&fx, &sealer, "soa/web/secrets/api_key.json", "new");
    backend.clear_calls();
    let report = sync_service(&ctx, "web").await;

    assert_eq!(report.count(Outcome::Updated), 1);
    let id = SecretId::provider("web", "api_key");
    assert_eq!(backend.payload_of(&id).unwrap().get("api_key").unwrap().expose(), b"new");
    assert!(matches!(backend.mutations()[0], BackendCall::Update(_)));
}

#[tokio::test]
async fn test_other_ecosystem_only_is_skipped() {
    let fx = SoaFixture::new();
    let key = generate_master_key();
    let prod = EncryptedProvider::new("prod", SecretBytes::from(key.clone()));
    write_sealed(&fx, &prod, "soa/web/secrets/api_key.json", "s3cret");
    let (_, provider) = providers(&key);
    let backend = Arc::new(InMemoryBackend::new());

    let report = sync_service(&fx.context(provider, backend.clone()), "web").await;
    assert!(report.success());
    assert_eq!(report.count(Outcome::Skipped), 1);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_wrong_master_key_fails_only_that_service() {
    let fx = SoaFixture::new();
    let (sealer, _) = providers(&generate_master_key());
    let (_, provider) = providers(&generate_master_key());
    write_sealed(&fx, &sealer, "soa/web/secrets/api_key.json", "s3cret");
    fx.write(
        "soa/api/secrets/plain.json",
        r#"{"environments": {}}"#,
    );
    let backend = Arc::new(InMemoryBackend::new());
    let ctx = fx.context(provider, backend.clone());

    let reports = secretsync_secrets::sync_services(&ctx, &services(&["web", "api"])).await;
    assert!(!reports[0].success());
    assert!(matches!(
        reports[0].failures[0].error,
        SecretError::DecryptionFailed(_)
    ));
    assert!(reports[1].success());
    assert!(backend.mutations().is_empty());
}
