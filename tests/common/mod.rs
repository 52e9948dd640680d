//! Common test utilities for tplcache integration tests

// Not every helper is used by every test file
#![allow(dead_code)]

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tplcache::config::CompilerConfig;
use tplcache::test_utils::JobArchiveBuilder;

pub const ROUTER_TEMPLATE: &str =
    "listen {{ properties.router.port }}\nname {{ spec.job_name }}/{{ spec.index }}\n";

/// A scratch directory holding a release, its job tarballs and compiler state.
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        tplcache::test_utils::init_test_logging(None);
        Ok(Self {
            dir: TempDir::new().context("Failed to create temp dir")?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    pub fn config(&self) -> CompilerConfig {
        CompilerConfig {
            state_dir: self.state_dir(),
            work_dir: Some(self.dir.path().join("work")),
            ..CompilerConfig::default()
        }
    }

    /// Write `jobs/router.tgz` and `release.yml` for the router release.
    pub fn write_router_release(&self) -> Result<PathBuf> {
        JobArchiveBuilder::new("router")
            .template("router.conf.tera", "config/router.conf", ROUTER_TEMPLATE)
            .package("router-pkg")
            .property("router.port", Some(serde_json::json!(8080)))
            .write_to(&self.dir.path().join("jobs").join("router.tgz"))?;

        self.write_file(
            "release.yml",
            r#"name: edge
version: "1"
jobs:
- name: router
  version: "1"
  fingerprint: 9d1c0e
  tar_path: jobs/router.tgz
  templates: [router_conf]
packages:
- name: router-pkg
  version: "2.1"
- name: common-pkg
  version: "0.3"
"#,
        )
    }

    pub fn write_file(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    pub fn write_yaml<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        self.write_file(name, &serde_yaml::to_string(value)?)
    }

    /// Number of blobs in the default blob store location.
    pub fn blob_count(&self) -> usize {
        count_entries(&self.config().blobstore_dir())
    }
}

/// Entries directly under `dir`, 0 when it does not exist.
pub fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

/// Content of `wanted` inside a gzip tarball, ignoring a leading `./`.
pub fn read_archive_entry(archive: &Path, wanted: &str) -> Result<Option<String>> {
    let file = std::fs::File::open(archive)?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    for entry in tar.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_path_buf();
        if path.strip_prefix(".").unwrap_or(&path) == Path::new(wanted) {
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            return Ok(Some(content));
        }
    }
    Ok(None)
}
