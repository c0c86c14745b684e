//! Shared fixtures for secretsync integration tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use secretsync_secrets::{SecretBackend, SecretProvider, SyncContext};
use tempfile::TempDir;

/// A throwaway service configuration root plus credential directory.
pub struct SoaFixture {
    tmp: TempDir,
}

impl SoaFixture {
    pub fn new() -> Self {
        Self {
            tmp: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn soa_dir(&self) -> PathBuf {
        self.root().join("soa")
    }

    pub fn credentials_dir(&self) -> PathBuf {
        self.root().join("boto")
    }

    /// Write `content` to a path relative to the fixture root.
    pub fn write(&self, relative: &str, content: &str) {
        let path = self.root().join(relative);
        std::fs::create_dir_all(path.parent().expect("relative path has a parent"))
            .expect("create parent dirs");
        std::fs::write(path, content).expect("write fixture file");
    }

    /// A sync context for cluster `devc` over this fixture.
    pub fn context(
        &self,
        provider: SecretProvider,
        backend: Arc<dyn SecretBackend>,
    ) -> SyncContext {
        SyncContext {
            soa_dir: self.soa_dir(),
            cluster: "devc".to_string(),
            credentials_dir: self.credentials_dir(),
            provider,
            backend,
        }
    }
}

impl Default for SoaFixture {
    fn default() -> Self {
        Self::new()
    }
}

pub fn services(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
