use anyhow::Result;
use std::sync::Arc;

use super::{JobRecord, MemoryRepository, Repository};
use crate::models::{Release, ReleaseJob, ReleaseJobKey, Template};

/// Release job identity → uploaded job source archive.
#[derive(Clone)]
pub struct JobsRepository {
    inner: Arc<dyn Repository<ReleaseJobKey, JobRecord>>,
}

impl JobsRepository {
    pub fn new(inner: Arc<dyn Repository<ReleaseJobKey, JobRecord>>) -> Self {
        Self { inner }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryRepository::new()))
    }

    pub async fn find(&self, job: &ReleaseJob) -> Result<Option<JobRecord>> {
        self.inner.find(&job.key()).await
    }

    pub async fn save(&self, job: &ReleaseJob, record: JobRecord) -> Result<()> {
        self.inner.save(job.key(), record).await
    }
}

/// Deployment template name → release job that defines it.
#[derive(Clone)]
pub struct TemplateToJobRepository {
    inner: Arc<dyn Repository<String, ReleaseJob>>,
}

impl TemplateToJobRepository {
    pub fn new(inner: Arc<dyn Repository<String, ReleaseJob>>) -> Self {
        Self { inner }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryRepository::new()))
    }

    /// Point every template `job` declares at `job`, replacing older mappings.
    pub async fn save_for_job(&self, release: &Release, job: &ReleaseJob) -> Result<()> {
        for template in job.template_names() {
            tracing::debug!(
                "Mapping template '{}' -> job '{}' (release {}/{})",
                template,
                job.name,
                release.name,
                release.version
            );
            self.inner.save(template, job.clone()).await?;
        }
        Ok(())
    }

    pub async fn find_by_template(&self, template: &Template) -> Result<Option<ReleaseJob>> {
        self.inner.find(&template.name).await
    }
}
