//! Full runs against the on-disk secret store.

use std::sync::Arc;

use secretsync_core::SecretBytes;
use secretsync_integration_tests::{services, SoaFixture};
use secretsync_secrets::{
    sync_all_secrets, sync_service, DirectoryBackend, Outcome, RemoteState, SecretBackend,
    SecretId, SecretPayload, SecretProvider,
};

#[tokio::test]
async fn test_second_run_with_fresh_backend_is_up_to_date() {
    let fx = SoaFixture::new();
    fx.write("soa/web/secrets/db_password.json", r#"{"value": "hunter2"}"#);
    fx.write("soa/web/kubernetes-devc.yaml", "main:\n  boto_keys: [A]\n_tmpl:\n  boto_keys: [B]\n");
    fx.write("boto/A", "k1");
    let store = fx.root().join("store");

    let first = fx.context(
        SecretProvider::plaintext(),
        Arc::new(DirectoryBackend::new(store.clone())),
    );
    assert!(sync_all_secrets(&first, &services(&["web"])).await);

    let second = fx.context(
        SecretProvider::plaintext(),
        Arc::new(DirectoryBackend::new(store.clone())),
    );
    let report = sync_service(&second, "web").await;
    assert!(report.success());
    assert_eq!(report.count(Outcome::UpToDate), 2);
    let stored = std::fs::read_dir(store.join("secrets")).unwrap().count();
    assert_eq!(stored, 2, "template instances must not produce secrets");
}

#[tokio::test]
async fn test_interrupted_update_is_repaired_by_rerun() {
    let fx = SoaFixture::new();
    fx.write("soa/web/secrets/token.json", r#"{"value": "v1"}"#);
    let backend = Arc::new(DirectoryBackend::new(fx.root().join("store")));
    let ctx = fx.context(SecretProvider::plaintext(), backend.clone());
    sync_service(&ctx, "web").await;

    // Payload written, signature write lost.
    let id = SecretId::provider("web", "token");
    backend
        .update(&id, &SecretPayload::single("token", SecretBytes::from("v2")))
        .await
        .unwrap();
    fx.write("soa/web/secrets/token.json", r#"{"value": "v2"}"#);

    let report = sync_service(&ctx, "web").await;
    assert_eq!(report.count(Outcome::Updated), 1);

    let again = sync_service(&ctx, "web").await;
    assert_eq!(again.count(Outcome::UpToDate), 1);
}

#[tokio::test]
async fn test_existing_unsigned_secret_is_adopted() {
    let fx = SoaFixture::new();
    fx.write("soa/web/secrets/token.json", r#"{"value": "v1"}"#);
    let backend = Arc::new(DirectoryBackend::new(fx.root().join("store")));
    let id = SecretId::provider("web", "token");
    backend
        .create(&id, &SecretPayload::single("token", SecretBytes::from("other")))
        .await
        .unwrap();
    assert_eq!(backend.get_signature(&id).await.unwrap(), RemoteState::Unsigned);

    let report = sync_service(&fx.context(SecretProvider::plaintext(), backend.clone()), "web").await;
    assert_eq!(report.count(Outcome::Updated), 1);
    assert!(matches!(
        backend.get_signature(&id).await.unwrap(),
        RemoteState::Signed(_)
    ));
}
