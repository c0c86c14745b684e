//! System config directory loading and provider selection.

use secretsync_core::config::{ProviderConfig, StoreConfig};
use secretsync_core::SystemConfig;
use secretsync_integration_tests::SoaFixture;
use secretsync_secrets::crypto::generate_master_key;
use secretsync_secrets::SecretProvider;

#[test]
fn test_split_config_merges_and_selects_encrypted_provider() {
    let fx = SoaFixture::new();
    let key_file = fx.root().join("master.key");
    std::fs::write(&key_file, hex::encode(generate_master_key())).unwrap();

    fx.write("config/00-cluster.json", r#"{cluster: "norcal-devc"}"#);
    fx.write(
        "config/10-provider.json",
        &format!(
            r#"{{"secret_provider": {{"type": "encrypted", "key_file": "{}"}},
                "vault_cluster_config": {{"norcal-devc": "devc"}}}}"#,
            key_file.display()
        ),
    );
    fx.write(
        "config/20-store.json",
        r#"{"secret_store": {"type": "directory", "path": "/tmp/secretsync-store"}}"#,
    );

    let config = SystemConfig::load_dir(&fx.root().join("config")).unwrap();
    config.validate().unwrap();
    assert!(matches!(config.secret_provider, ProviderConfig::Encrypted { .. }));
    assert!(matches!(config.secret_store, StoreConfig::Directory { .. }));

    let cluster = config.resolve_cluster(None).unwrap();
    assert_eq!(config.ecosystem_for(&cluster), "devc");

    // An exported master key would take precedence over the key file.
    if std::env::var_os("SECRETSYNC_MASTER_KEY").is_none() {
        let provider = SecretProvider::from_config(&config, &cluster).unwrap();
        assert_eq!(provider.name(), "encrypted");
        match provider {
            SecretProvider::Encrypted(p) => assert_eq!(p.ecosystem(), "devc"),
            other => panic!("unexpected provider: {}", other.name()),
        }
    }
}

#[test]
fn test_later_file_replaces_whole_section() {
    let fx = SoaFixture::new();
    fx.write(
        "config/a.json",
        r#"{"secret_store": {"type": "kubernetes", "namespace": "custom"}}"#,
    );
    fx.write("config/b.json", r#"{"secret_store": {"type": "kubernetes"}}"#);

    let config = SystemConfig::load_dir(&fx.root().join("config")).unwrap();
    match config.secret_store {
        StoreConfig::Kubernetes(k8s) => assert_eq!(k8s.namespace, "paasta"),
        other => panic!("unexpected store: {other:?}"),
    }
}

#[test]
fn test_missing_key_file_fails_provider_setup() {
    let fx = SoaFixture::new();
    fx.write(
        "config/provider.json",
        &format!(
            r#"{{"cluster": "devc", "secret_provider": {{"type": "encrypted", "key_file": "{}"}}}}"#,
            fx.root().join("absent.key").display()
        ),
    );
    let config = SystemConfig::load_dir(&fx.root().join("config")).unwrap();

    if std::env::var_os("SECRETSYNC_MASTER_KEY").is_none() {
        assert!(SecretProvider::from_config(&config, "devc").is_err());
    }
}
