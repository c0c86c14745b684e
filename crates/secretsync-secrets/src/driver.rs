//! Batch driver: syncs every secret of every requested service.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::backend::SecretBackend;
use crate::discovery;
use crate::error::{Result, SecretError};
use crate::provider::SecretProvider;
use crate::reconcile::{Outcome, Reconciler};
use crate::types::{SecretContent, SecretDefinition, SecretId};

/// Everything a sync run needs, resolved up front.
pub struct SyncContext {
    pub soa_dir: PathBuf,
    pub cluster: String,
    pub credentials_dir: PathBuf,
    pub provider: SecretProvider,
    pub backend: Arc<dyn SecretBackend>,
}

/// A secret (or a whole discovery step) that could not be synced.
#[derive(Debug)]
pub struct SyncFailure {
    /// Secret identity or discovery step that failed.
    pub target: String,
    pub error: SecretError,
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.target, self.error)
    }
}

/// Result of syncing one service.
#[derive(Debug, Default)]
pub struct ServiceReport {
    pub service: String,
    pub outcomes: Vec<(SecretId, Outcome)>,
    pub failures: Vec<SyncFailure>,
}

impl ServiceReport {
    fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
            ..Default::default()
        }
    }

    /// A service succeeds when none of its secrets failed.
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of secrets that ended with `outcome`.
    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.iter().filter(|(_, o)| *o == outcome).count()
    }

    fn fail(&mut self, target: impl Into<String>, error: SecretError) {
        let target = target.into();
        error!(service = %self.service, target = %target, "failed to sync: {error}");
        self.failures.push(SyncFailure { target, error });
    }

    fn record(&mut self, id: &SecretId, result: Result<Outcome>) {
        match result {
            Ok(outcome) => {
                debug!(secret = %id, %outcome, "secret synced");
                self.outcomes.push((id.clone(), outcome));
            }
            Err(e) => self.fail(id.to_string(), e),
        }
    }
}

fn check_service_name(service: &str) -> Result<()> {
    if service.is_empty() || service == "." || service == ".." || service.contains('/') {
        return Err(SecretError::InvalidName(format!(
            "{service:?} is not a valid service name"
        )));
    }
    Ok(())
}

/// Sync all secrets of one service.
///
/// Credential secrets from the instance config go first, then each
/// `secrets/*.json` definition. A failing secret is recorded and the rest
/// still run. A service without a secrets directory has nothing to do.
pub async fn sync_service(ctx: &SyncContext, service: &str) -> ServiceReport {
    let mut report = ServiceReport::new(service);
    if let Err(e) = check_service_name(service) {
        report.fail(service, e);
        return report;
    }

    let files = match discovery::definition_files(&ctx.soa_dir, service).await {
        Ok(Some(files)) => files,
        Ok(None) => {
            info!(service, "no secrets directory, nothing to sync");
            return report;
        }
        Err(e) => {
            report.fail(format!("secrets directory of {service}"), e);
            return report;
        }
    };

    let reconciler = Reconciler::new(ctx.backend.as_ref());

    match discovery::credential_groups(&ctx.soa_dir, service, &ctx.cluster).await {
        Ok(groups) => {
            for group in &groups {
                let definition =
                    discovery::load_credentials(service, group, &ctx.credentials_dir).await;
                if definition_is_empty(&definition) {
                    warn!(secret = %definition.id, "no credential files found, skipping");
                }
                let result = reconciler.sync_definition(&definition, &ctx.provider).await;
                report.record(&definition.id, result);
            }
        }
        Err(e) => report.fail(format!("instance config of {service}"), e),
    }

    for file in &files {
        let id = SecretId::provider(service, &file.name);
        let result = match discovery::load_definition(service, file).await {
            Ok(definition) => reconciler.sync_definition(&definition, &ctx.provider).await,
            Err(e) => Err(e),
        };
        report.record(&id, result);
    }

    info!(
        service,
        created = report.count(Outcome::Created),
        updated = report.count(Outcome::Updated),
        up_to_date = report.count(Outcome::UpToDate),
        conflicts = report.count(Outcome::CreateConflict),
        skipped = report.count(Outcome::Skipped),
        failed = report.failures.len(),
        "service synced"
    );
    report
}

fn definition_is_empty(definition: &SecretDefinition) -> bool {
    matches!(&definition.content, SecretContent::Credentials(e) if e.is_empty())
}

/// Sync each service in order; one service failing never stops the others.
pub async fn sync_services(ctx: &SyncContext, services: &[String]) -> Vec<ServiceReport> {
    let mut reports = Vec::with_capacity(services.len());
    for service in services {
        reports.push(sync_service(ctx, service).await);
    }
    reports
}

/// Sync all requested services, returning `true` only if every one succeeded.
pub async fn sync_all_secrets(ctx: &SyncContext, services: &[String]) -> bool {
    info!(
        cluster = %ctx.cluster,
        provider = ctx.provider.name(),
        services = services.len(),
        "syncing secrets"
    );
    let reports = sync_services(ctx, services).await;
    let failed: Vec<&str> = reports
        .iter()
        .filter(|r| !r.success())
        .map(|r| r.service.as_str())
        .collect();
    if !failed.is_empty() {
        error!(services = ?failed, "some services failed to sync");
    }
    failed.is_empty()
}
