//! On-disk fixtures: job source tarballs and release manifests.

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::constants::{JOB_MANIFEST_FILE, JOB_TEMPLATES_DIR};
use crate::models::{
    JobDescription, JobManifest, JobTemplate, PackageRef, PropertyDefinition, Release, ReleaseJob,
    ReleasePackage,
};

/// Builds a gzip job tarball laid out as `job.MF` + `templates/<source>`.
///
/// ```rust,no_run
/// use tplcache::test_utils::JobArchiveBuilder;
///
/// let tarball = JobArchiveBuilder::new("router")
///     .template("router.conf.tera", "config/router.conf", "port={{ properties.port }}")
///     .package("router-pkg")
///     .write_to(std::path::Path::new("/tmp/router.tgz"))
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct JobArchiveBuilder {
    manifest: Option<JobManifest>,
    sources: BTreeMap<String, String>,
}

impl JobArchiveBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            manifest: Some(JobManifest {
                name: name.into(),
                ..JobManifest::default()
            }),
            sources: BTreeMap::new(),
        }
    }

    /// A tarball with no `job.MF`, for exercising reader failures.
    pub fn without_manifest() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn template(
        mut self,
        source: impl Into<String>,
        destination: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let source = source.into();
        if let Some(manifest) = &mut self.manifest {
            manifest.templates.insert(source.clone(), destination.into());
        }
        self.sources.insert(source, content.into());
        self
    }

    #[must_use]
    pub fn package(mut self, name: impl Into<String>) -> Self {
        if let Some(manifest) = &mut self.manifest {
            manifest.packages.push(name.into());
        }
        self
    }

    #[must_use]
    pub fn property(mut self, name: impl Into<String>, default: Option<Value>) -> Self {
        if let Some(manifest) = &mut self.manifest {
            manifest.properties.insert(
                name.into(),
                PropertyDefinition {
                    description: None,
                    default,
                },
            );
        }
        self
    }

    /// Write the tarball to `path`, returning it.
    pub fn write_to(&self, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent() {
            crate::utils::ensure_dir(parent)?;
        }
        let file =
            File::create(path).with_context(|| format!("Creating fixture {}", path.display()))?;
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::fast()));

        if let Some(manifest) = &self.manifest {
            let yaml = serde_yaml::to_string(manifest)?;
            append_file(&mut builder, JOB_MANIFEST_FILE, yaml.as_bytes())?;
        }
        for (source, content) in &self.sources {
            append_file(
                &mut builder,
                &format!("{JOB_TEMPLATES_DIR}/{source}"),
                content.as_bytes(),
            )?;
        }

        builder.into_inner()?.finish()?;
        Ok(path.to_path_buf())
    }
}

fn append_file<W: std::io::Write>(
    builder: &mut tar::Builder<W>,
    name: &str,
    content: &[u8],
) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, content)?;
    Ok(())
}

/// Write `description` as YAML, the source format [`super::FakeReaderFactory`] reads.
pub fn write_job_description(dir: &Path, description: &JobDescription) -> Result<PathBuf> {
    crate::utils::ensure_dir(dir)?;
    let path = dir.join(format!("{}.yml", description.name));
    std::fs::write(&path, serde_yaml::to_string(description)?)?;
    Ok(path)
}

/// Job description declaring `packages` with a single trivial template.
pub fn job_description(name: &str, packages: &[&str]) -> JobDescription {
    JobDescription {
        name: name.to_string(),
        templates: vec![JobTemplate {
            source: format!("{name}.conf.tera"),
            destination: format!("config/{name}.conf"),
            content: format!("{name} {{{{ spec.index }}}}"),
        }],
        packages: packages
            .iter()
            .map(|name| PackageRef {
                name: (*name).to_string(),
            })
            .collect(),
        properties: BTreeMap::new(),
    }
}

/// Release job pointing at `tar_path`, answering to `templates`.
pub fn release_job(name: &str, tar_path: PathBuf, templates: &[&str]) -> ReleaseJob {
    ReleaseJob {
        name: name.to_string(),
        version: "1".to_string(),
        fingerprint: format!("{name}-fp"),
        tar_path,
        templates: templates.iter().map(|t| (*t).to_string()).collect(),
    }
}

/// The router release: job `router` (declares `router-pkg`, template `router_conf`)
/// and packages `[router-pkg, common-pkg]`. Sources are written under `dir` in the
/// fake reader's YAML format.
pub fn router_release(dir: &Path) -> Result<Release> {
    let source = write_job_description(dir, &job_description("router", &["router-pkg"]))?;
    Ok(Release {
        name: "edge".to_string(),
        version: "1".to_string(),
        jobs: vec![release_job("router", source, &["router_conf"])],
        packages: vec![
            Some(ReleasePackage::named("router-pkg")),
            Some(ReleasePackage::named("common-pkg")),
        ],
    })
}
