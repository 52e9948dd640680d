use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{MemoryRepository, Repository, TemplateRecord};
use crate::models::{DeploymentJob, Instance};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateKey {
    pub job: String,
    pub instance: String,
}

impl TemplateKey {
    pub fn new(job: &DeploymentJob, instance: &Instance) -> Self {
        Self {
            job: job.name.clone(),
            instance: instance.key(),
        }
    }
}

impl std::fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.job, self.instance)
    }
}

/// `(deployment job, instance)` → rendered template archive.
#[derive(Clone)]
pub struct TemplatesRepository {
    inner: Arc<dyn Repository<TemplateKey, TemplateRecord>>,
}

impl TemplatesRepository {
    pub fn new(inner: Arc<dyn Repository<TemplateKey, TemplateRecord>>) -> Self {
        Self { inner }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryRepository::new()))
    }

    pub async fn find(
        &self,
        job: &DeploymentJob,
        instance: &Instance,
    ) -> Result<Option<TemplateRecord>> {
        self.inner.find(&TemplateKey::new(job, instance)).await
    }

    pub async fn save(
        &self,
        job: &DeploymentJob,
        instance: &Instance,
        record: TemplateRecord,
    ) -> Result<()> {
        self.inner.save(TemplateKey::new(job, instance), record).await
    }
}
