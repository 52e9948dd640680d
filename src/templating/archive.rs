//! Tera-backed [`ArchiveCompiler`]: renders every job template for an instance and
//! packs the result into one gzip tarball.

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use tempfile::TempPath;

use super::ArchiveCompiler;
use super::context::build_context;
use super::renderer::{RenderingMetadata, TemplateRenderer};
use crate::models::{Instance, JobDescription};
use crate::utils::{ensure_dir, remove_file_if_exists};

/// Renders into a staging directory under `work_dir` and writes
/// `<work_dir>/rendered-<uuid>.tgz` with entries laid out as `<job>/<destination>`.
#[derive(Debug, Clone)]
pub struct TeraArchiveCompiler {
    work_dir: PathBuf,
    renderer: TemplateRenderer,
}

impl TeraArchiveCompiler {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            renderer: TemplateRenderer::new(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn render_all(&self, jobs: &[JobDescription], instance: &Instance) -> Result<TempPath> {
        ensure_dir(&self.work_dir)?;
        let staging = tempfile::Builder::new()
            .prefix("render-")
            .tempdir_in(&self.work_dir)
            .context("Creating render staging directory")?;

        for job in jobs {
            let context = build_context(job, instance)?;
            for template in &job.templates {
                let relative = Path::new(&template.destination);
                if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
                    anyhow::bail!(
                        "Template {}/{} has invalid destination '{}'",
                        job.name,
                        template.source,
                        template.destination
                    );
                }

                let metadata = RenderingMetadata {
                    job_name: job.name.clone(),
                    template: template.source.clone(),
                };
                let rendered =
                    self.renderer.render_template(&template.content, &context, &metadata)?;

                let output = staging.path().join(&job.name).join(relative);
                if let Some(parent) = output.parent() {
                    ensure_dir(parent)?;
                }
                std::fs::write(&output, rendered)
                    .with_context(|| format!("Writing rendered {}", output.display()))?;
            }
        }

        // Removed on drop until the caller takes ownership of the path
        let archive = tempfile::Builder::new()
            .prefix(&format!("rendered-{}", uuid::Uuid::new_v4()))
            .suffix(".tgz")
            .rand_bytes(0)
            .tempfile_in(&self.work_dir)
            .context("Creating rendered archive")?;
        Self::pack(staging.path(), archive.as_file()).with_context(|| {
            format!("Packing rendered templates into {}", archive.path().display())
        })?;

        staging.close().context("Removing render staging directory")?;
        Ok(archive.into_temp_path())
    }

    fn pack(source: &Path, archive: &File) -> Result<()> {
        let mut builder = tar::Builder::new(GzEncoder::new(archive, Compression::default()));
        builder.append_dir_all(".", source)?;
        builder.into_inner()?.finish()?;
        Ok(())
    }
}

impl ArchiveCompiler for TeraArchiveCompiler {
    fn compile<'a>(
        &'a self,
        jobs: &'a [JobDescription],
        instance: &'a Instance,
    ) -> BoxFuture<'a, Result<PathBuf>> {
        async move {
            let compiler = self.clone();
            let owned_jobs = jobs.to_vec();
            let owned_instance = instance.clone();
            let archive = tokio::task::spawn_blocking(move || {
                compiler.render_all(&owned_jobs, &owned_instance)
            })
            .await
            .context("Render task panicked")??;
            let archive = archive.keep().context("Keeping rendered archive")?;

            tracing::info!(
                "Rendered {} job(s) for instance {} into {}",
                jobs.len(),
                instance,
                archive.display()
            );
            Ok(archive)
        }
        .boxed()
    }

    fn clean_up(&self, path: &Path) -> Result<()> {
        remove_file_if_exists(path)
    }
}
