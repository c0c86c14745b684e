//! secretsync command-line interface.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use secretsync_core::{paths, SystemConfig};
use secretsync_secrets::{backend, sync_all_secrets, SecretProvider, SyncContext};
use tracing::debug;

/// Sync service secrets into the cluster secret store.
#[derive(Parser, Debug)]
#[command(name = "secretsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Services whose secrets should be synced
    #[arg(required = true, value_name = "SERVICE")]
    pub services: Vec<String>,

    /// Cluster to sync secrets for (defaults to the configured cluster)
    #[arg(short, long)]
    pub cluster: Option<String>,

    /// Service configuration root
    #[arg(short = 'd', long, default_value = paths::DEFAULT_SOA_DIR)]
    pub soa_dir: PathBuf,

    /// System configuration directory
    #[arg(long, env = "SECRETSYNC_CONFIG_DIR", default_value = paths::DEFAULT_CONFIG_DIR)]
    pub config_dir: PathBuf,

    /// Directory holding raw credential files (overrides the config)
    #[arg(long)]
    pub credentials_dir: Option<PathBuf>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Default log filter when `RUST_LOG` is unset.
pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "secretsync=warn",
        _ => "secretsync=debug",
    }
}

/// Resolve configuration and build everything a sync run needs.
pub async fn build_context(cli: &Cli) -> anyhow::Result<SyncContext> {
    let config = SystemConfig::load_dir_or_default(&paths::expand_tilde(&cli.config_dir))
        .with_context(|| format!("failed to load config from {}", cli.config_dir.display()))?;
    config.validate().context("invalid system config")?;

    let cluster = config.resolve_cluster(cli.cluster.as_deref())?;
    let provider = SecretProvider::from_config(&config, &cluster)
        .context("failed to initialise secret provider")?;
    let backend = backend::from_config(&config.secret_store)
        .await
        .context("failed to initialise secret store")?;

    let credentials_dir = cli
        .credentials_dir
        .clone()
        .unwrap_or_else(|| config.credentials_dir.clone());

    debug!(
        cluster = %cluster,
        provider = provider.name(),
        soa_dir = %cli.soa_dir.display(),
        "resolved sync context"
    );

    Ok(SyncContext {
        soa_dir: paths::expand_tilde(&cli.soa_dir),
        cluster,
        credentials_dir: paths::expand_tilde(&credentials_dir),
        provider,
        backend,
    })
}

/// Run a sync. `Ok(false)` means at least one service failed.
pub async fn run(cli: Cli) -> anyhow::Result<bool> {
    let ctx = build_context(&cli).await?;
    Ok(sync_all_secrets(&ctx, &cli.services).await)
}
