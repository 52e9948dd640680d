//! Compiler configuration (`tplcache.toml`).
//!
//! ```toml
//! # Where repository state (JSON documents) lives
//! state_dir = "/var/lib/tplcache"
//! # Defaults to <state_dir>/blobs
//! blobstore_dir = "/var/lib/tplcache/blobs"
//! # Scratch space for unpacking and rendering; defaults to <state_dir>/work
//! work_dir = "/tmp/tplcache"
//! # Seconds to wait for a busy cache key before giving up
//! lock_timeout_secs = 120
//! ```
//!
//! # Resolution
//!
//! 1. The path passed explicitly (CLI `--config`)
//! 2. `TPLCACHE_CONFIG`
//! 3. `./tplcache.toml` when it exists
//! 4. Built-in defaults
//!
//! `TPLCACHE_STATE_DIR` overrides `state_dir` afterwards. Relative directories in a
//! config file are taken relative to that file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::blobstore::LocalBlobStore;
use crate::cache::KeyedLocks;
use crate::compiler::{Repositories, TemplatesCompiler};
use crate::constants::{CONFIG_FILE_NAME, CONFIG_PATH_ENV, DEFAULT_LOCK_TIMEOUT_SECS, STATE_DIR_ENV};
use crate::core::TplError;
use crate::reader::TarReaderFactory;
use crate::repo::{
    JobsRepository, JsonFileRepository, RuntimePackagesRepository, TemplateToJobRepository,
    TemplatesRepository,
};
use crate::templating::TeraArchiveCompiler;

const DEFAULT_STATE_DIR: &str = ".tplcache";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub state_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blobstore_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
    pub lock_timeout_secs: u64,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            blobstore_dir: None,
            work_dir: None,
            lock_timeout_secs: DEFAULT_LOCK_TIMEOUT_SECS,
        }
    }
}

impl CompilerConfig {
    /// Load configuration following the resolution order in the module docs.
    pub async fn load(explicit: Option<PathBuf>) -> Result<Self> {
        Self::load_with_env(explicit, |name| std::env::var(name).ok()).await
    }

    async fn load_with_env<F>(explicit: Option<PathBuf>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = explicit.or_else(|| env(CONFIG_PATH_ENV).map(PathBuf::from));
        let mut config = match path {
            Some(path) => Self::load_from(&path).await?,
            None => {
                let local = PathBuf::from(CONFIG_FILE_NAME);
                if local.exists() {
                    Self::load_from(&local).await?
                } else {
                    Self::default()
                }
            }
        };

        if let Some(state_dir) = env(STATE_DIR_ENV).filter(|s| !s.is_empty()) {
            tracing::debug!("Using state directory from {}: {}", STATE_DIR_ENV, state_dir);
            config.state_dir = PathBuf::from(state_dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from a specific file. A missing file is an error here.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn rebase(&mut self, base: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        rebase(&mut self.state_dir);
        if let Some(dir) = &mut self.blobstore_dir {
            rebase(dir);
        }
        if let Some(dir) = &mut self.work_dir {
            rebase(dir);
        }
    }

    fn validate(&self) -> Result<(), TplError> {
        if self.lock_timeout_secs == 0 {
            return Err(TplError::ConfigError {
                message: "lock_timeout_secs must be greater than zero".to_string(),
            });
        }
        if self.state_dir.as_os_str().is_empty() {
            return Err(TplError::ConfigError {
                message: "state_dir must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn blobstore_dir(&self) -> PathBuf {
        self.blobstore_dir.clone().unwrap_or_else(|| self.state_dir.join("blobs"))
    }

    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(|| self.state_dir.join("work"))
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    /// Repositories persisted as JSON documents under `state_dir`.
    pub fn file_repositories(&self) -> Repositories {
        let dir = &self.state_dir;
        Repositories {
            jobs: JobsRepository::new(Arc::new(JsonFileRepository::new(dir.join("jobs.json")))),
            template_to_job: TemplateToJobRepository::new(Arc::new(JsonFileRepository::new(
                dir.join("template_to_job.json"),
            ))),
            runtime_packages: RuntimePackagesRepository::new(Arc::new(JsonFileRepository::new(
                dir.join("runtime_packages.json"),
            ))),
            templates: TemplatesRepository::new(Arc::new(JsonFileRepository::new(
                dir.join("templates.json"),
            ))),
        }
    }

    /// Wire a compiler over file-backed repositories, a local blob store, tarball
    /// readers and the Tera renderer.
    pub fn build_compiler(&self) -> TemplatesCompiler {
        let work_dir = self.work_dir();
        let blobstore = Arc::new(LocalBlobStore::new(self.blobstore_dir()));
        let readers = TarReaderFactory::new(blobstore.clone()).with_work_dir(work_dir.join("jobs"));
        let renderer = TeraArchiveCompiler::new(work_dir.join("rendered"));

        TemplatesCompiler::new(
            self.file_repositories(),
            blobstore,
            Arc::new(readers),
            Arc::new(renderer),
        )
        .with_locks(KeyedLocks::new(self.lock_timeout()))
    }
}
