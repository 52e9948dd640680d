//! The templates compiler: find-or-create caching around job sources, runtime
//! packages and rendered template archives.
//!
//! Two workflows drive everything:
//!
//! - [`TemplatesCompiler::precompile`] runs once per release. Every job's source
//!   tarball is uploaded to the blob store unless a record for it already exists,
//!   every template the job declares is mapped to the job, and the release's full
//!   package list is saved for the job.
//! - [`TemplatesCompiler::compile`] runs once per `(deployment job, instance)`. Each
//!   template is resolved to its release job and cached source blob, the sources are
//!   read, the job's runtime packages are memoized, the [`ArchiveCompiler`] renders
//!   everything, and the result is uploaded and recorded.
//!
//! Readers and rendered archives are held by scope guards, so they are released on
//! every path out of `compile`, including errors and a dropped future.
//!
//! # Concurrency
//!
//! Find-then-create paths run under [`KeyedLocks`]:
//!
//! | Lock key | Guards |
//! |---|---|
//! | `job-source:<release job>` | source upload in `precompile` |
//! | `packages:<release job>` | package memoization in `compile` |
//! | `compile:<job>@<instance>` | render + record for one pair |
//!
//! Work for different keys proceeds in parallel.
//!
//! # Re-compiling
//!
//! `compile` always renders and overwrites the `(job, instance)` record; callers
//! that only want the existing archive use [`TemplatesCompiler::find_rendered_archive`].

mod guards;
mod packages;

pub use packages::filter_packages;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::blobstore::{BlobId, BlobRef, BlobStore, Fingerprint};
use crate::cache::KeyedLocks;
use crate::core::TplError;
use crate::models::{DeploymentJob, Instance, Release, ReleaseJob, ReleasePackage, Template};
use crate::reader::ReaderFactory;
use crate::repo::{
    JobRecord, JobsRepository, RuntimePackagesRepository, TemplateKey, TemplateRecord,
    TemplateToJobRepository, TemplatesRepository,
};
use crate::templating::ArchiveCompiler;
use guards::{OpenReaders, RenderedArchive};

/// Where a rendered template archive was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedArchiveRecord {
    pub blob_id: BlobId,
    pub fingerprint: Fingerprint,
}

impl From<TemplateRecord> for RenderedArchiveRecord {
    fn from(record: TemplateRecord) -> Self {
        Self {
            blob_id: record.blob_id,
            fingerprint: record.fingerprint,
        }
    }
}

/// The four lookup tables the compiler reads and writes.
#[derive(Clone)]
pub struct Repositories {
    pub jobs: JobsRepository,
    pub template_to_job: TemplateToJobRepository,
    pub runtime_packages: RuntimePackagesRepository,
    pub templates: TemplatesRepository,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            jobs: JobsRepository::in_memory(),
            template_to_job: TemplateToJobRepository::in_memory(),
            runtime_packages: RuntimePackagesRepository::in_memory(),
            templates: TemplatesRepository::in_memory(),
        }
    }
}

/// Orchestrates precompile and compile over injected repositories and collaborators.
#[derive(Clone)]
pub struct TemplatesCompiler {
    jobs: JobsRepository,
    template_to_job: TemplateToJobRepository,
    runtime_packages: RuntimePackagesRepository,
    templates: TemplatesRepository,
    blobstore: Arc<dyn BlobStore>,
    reader_factory: Arc<dyn ReaderFactory>,
    archive_compiler: Arc<dyn ArchiveCompiler>,
    locks: KeyedLocks,
}

impl TemplatesCompiler {
    pub fn new(
        repositories: Repositories,
        blobstore: Arc<dyn BlobStore>,
        reader_factory: Arc<dyn ReaderFactory>,
        archive_compiler: Arc<dyn ArchiveCompiler>,
    ) -> Self {
        Self {
            jobs: repositories.jobs,
            template_to_job: repositories.template_to_job,
            runtime_packages: repositories.runtime_packages,
            templates: repositories.templates,
            blobstore,
            reader_factory,
            archive_compiler,
            locks: KeyedLocks::default(),
        }
    }

    /// Replace the per-key locks, e.g. to change the wait timeout.
    #[must_use]
    pub fn with_locks(mut self, locks: KeyedLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Store every job source of `release` and register its templates and packages.
    ///
    /// Safe to re-run: job sources that already have a record are not uploaded
    /// again, while template mappings and full package lists are re-saved.
    ///
    /// # Errors
    ///
    /// - [`TplError::MalformedRelease`] if the release has an empty package entry;
    ///   nothing is written in that case
    /// - any upload or repository failure, wrapped with the job it concerned.
    ///   Jobs processed before the failure stay committed.
    pub async fn precompile(&self, release: &Release) -> Result<()> {
        let packages = release_packages(release)?;
        tracing::info!(
            "Precompiling release {}/{} ({} jobs, {} packages)",
            release.name,
            release.version,
            release.jobs.len(),
            packages.len()
        );

        for job in &release.jobs {
            self.ensure_job_source(job).await?;

            self.template_to_job
                .save_for_job(release, job)
                .await
                .with_context(|| format!("Saving release job {}", job.name))?;

            self.runtime_packages
                .save_all_for_release_job(job, packages.clone())
                .await
                .with_context(|| format!("Saving release job packages {}", job.name))?;
        }

        Ok(())
    }

    async fn ensure_job_source(&self, job: &ReleaseJob) -> Result<()> {
        let key = job.key();
        let _guard = self.locks.acquire(format!("job-source:{key}")).await?;

        let existing = self
            .jobs
            .find(job)
            .await
            .with_context(|| format!("Finding job source blob {}", job.name))?;
        if let Some(record) = existing {
            tracing::debug!("Job source for {} already stored as {}", key, record.blob_id);
            return Ok(());
        }

        let (blob_id, fingerprint) = self
            .blobstore
            .create(&job.tar_path)
            .await
            .with_context(|| format!("Creating job source blob {}", job.name))?;
        tracing::info!("Stored job source {} as blob {}", key, blob_id);

        self.jobs
            .save(
                job,
                JobRecord {
                    blob_id,
                    fingerprint,
                },
            )
            .await
            .with_context(|| format!("Saving job record {}", job.name))
    }

    /// Render `job`'s templates for `instance`, upload the archive and record it.
    ///
    /// Always renders, even when a record for the pair exists; the new record
    /// replaces the old one. Calls for the same pair are serialized.
    ///
    /// # Errors
    ///
    /// - [`TplError::InvalidDeploymentJob`] if `job` has no templates
    /// - [`TplError::ExpectedToFind`] if a template or its job source was never
    ///   precompiled, or the job's full package list is missing
    /// - any read, render, upload or repository failure, wrapped with the stage.
    ///   No record is written on failure.
    pub async fn compile(
        &self,
        job: &DeploymentJob,
        instance: &Instance,
    ) -> Result<RenderedArchiveRecord> {
        if job.templates.is_empty() {
            return Err(TplError::InvalidDeploymentJob {
                job: job.name.clone(),
                reason: "no templates to compile".to_string(),
            }
            .into());
        }

        let key = TemplateKey::new(job, instance);
        let _guard = self.locks.acquire(format!("compile:{key}")).await?;

        let mut readers = self.build_job_readers(job).await?;

        let mut descriptions = Vec::new();
        for (release_job, reader) in readers.iter_mut() {
            let description = reader
                .read()
                .await
                .with_context(|| format!("Reading job {}", release_job.name))?;
            descriptions.push((release_job.clone(), description));
        }

        for (release_job, description) in &descriptions {
            self.associate_packages(release_job, description)
                .await
                .with_context(|| {
                    format!("Preparing runtime dep packages for {}", release_job.name)
                })?;
        }

        let descriptions: Vec<_> = descriptions.into_iter().map(|(_, d)| d).collect();
        let rendered = self
            .archive_compiler
            .compile(&descriptions, instance)
            .await
            .with_context(|| format!("Compiling templates for {}", key));
        readers.close_all();
        let archive = RenderedArchive::new(self.archive_compiler.as_ref(), rendered?);

        let (blob_id, fingerprint) = self
            .blobstore
            .create(archive.path())
            .await
            .with_context(|| format!("Creating compiled templates {}", key))?;

        let record = TemplateRecord {
            blob_id,
            fingerprint,
        };
        self.templates
            .save(job, instance, record.clone())
            .await
            .with_context(|| format!("Saving compiled templates record {}", key))?;

        tracing::info!("Compiled {} into blob {}", key, record.blob_id);
        Ok(record.into())
    }

    /// Resolve each template of `job` to its release job and source blob, and
    /// open a lazy reader per template.
    async fn build_job_readers(&self, job: &DeploymentJob) -> Result<OpenReaders> {
        let mut readers = OpenReaders::new();

        for template in &job.templates {
            let release_job = self.release_job_for(template).await?;

            let record = self
                .jobs
                .find(&release_job)
                .await
                .with_context(|| format!("Finding job source blob {}", release_job.name))?
                .ok_or_else(|| {
                    TplError::expected("job source blob", release_job.key().to_string())
                })?;

            let url = BlobRef::new(record.blob_id, record.fingerprint).to_url();
            tracing::debug!(
                "Template '{}' -> job '{}' at {}",
                template.name,
                release_job.name,
                url
            );
            readers.push(release_job, self.reader_factory.new_reader(&url));
        }

        Ok(readers)
    }

    async fn release_job_for(&self, template: &Template) -> Result<ReleaseJob> {
        let release_job = self
            .template_to_job
            .find_by_template(template)
            .await
            .with_context(|| format!("Finding dep-template -> rel-job {}", template.name))?
            .ok_or_else(|| TplError::expected("dep-template -> rel-job", template.name.clone()))?;
        Ok(release_job)
    }

    /// Memoized runtime packages of the release job that defines `template`.
    ///
    /// # Errors
    ///
    /// [`TplError::ExpectedToFind`] if the template was never precompiled or no
    /// compile has resolved the job's packages yet.
    pub async fn find_packages(&self, template: &Template) -> Result<Vec<ReleasePackage>> {
        let release_job = self.release_job_for(template).await?;
        let key = release_job.key();

        let packages = self
            .runtime_packages
            .find_by_release_job(&release_job)
            .await
            .with_context(|| format!("Finding rel-job -> rel-pkgs {}", key))?
            .ok_or_else(|| TplError::expected("rel-job -> rel-pkgs", key.to_string()))?;
        Ok(packages)
    }

    /// Record written by the latest successful `compile` of `(job, instance)`.
    ///
    /// # Errors
    ///
    /// [`TplError::ExpectedToFind`] if the pair was never compiled.
    pub async fn find_rendered_archive(
        &self,
        job: &DeploymentJob,
        instance: &Instance,
    ) -> Result<RenderedArchiveRecord> {
        let key = TemplateKey::new(job, instance);
        let record = self
            .templates
            .find(job, instance)
            .await
            .with_context(|| format!("Finding compiled templates {}", key))?
            .ok_or_else(|| TplError::expected("compiled templates", key.to_string()))?;
        Ok(record.into())
    }
}

/// The release's package list, rejecting empty entries.
fn release_packages(release: &Release) -> Result<Vec<ReleasePackage>, TplError> {
    release
        .packages
        .iter()
        .enumerate()
        .map(|(i, pkg)| {
            pkg.clone().ok_or_else(|| TplError::MalformedRelease {
                release: release.name.clone(),
                reason: format!("package entry {i} is empty"),
            })
        })
        .collect()
}
