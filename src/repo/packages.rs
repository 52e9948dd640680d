use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{MemoryRepository, Repository};
use crate::models::{ReleaseJob, ReleaseJobKey, ReleasePackage};

/// Which package list of a release job is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageSlot {
    /// Memoized list of packages the job actually needs at runtime.
    Runtime,
    /// Every package of the release the job came from.
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackagesKey {
    pub job: ReleaseJobKey,
    pub slot: PackageSlot,
}

/// Release job → package lists, with separate slots for the full release set and
/// the resolved runtime subset.
#[derive(Clone)]
pub struct RuntimePackagesRepository {
    inner: Arc<dyn Repository<PackagesKey, Vec<ReleasePackage>>>,
}

impl RuntimePackagesRepository {
    pub fn new(inner: Arc<dyn Repository<PackagesKey, Vec<ReleasePackage>>>) -> Self {
        Self { inner }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryRepository::new()))
    }

    fn key(job: &ReleaseJob, slot: PackageSlot) -> PackagesKey {
        PackagesKey {
            job: job.key(),
            slot,
        }
    }

    pub async fn find_by_release_job(
        &self,
        job: &ReleaseJob,
    ) -> Result<Option<Vec<ReleasePackage>>> {
        self.inner.find(&Self::key(job, PackageSlot::Runtime)).await
    }

    pub async fn save_for_release_job(
        &self,
        job: &ReleaseJob,
        packages: Vec<ReleasePackage>,
    ) -> Result<()> {
        self.inner.save(Self::key(job, PackageSlot::Runtime), packages).await
    }

    pub async fn find_all_by_release_job(
        &self,
        job: &ReleaseJob,
    ) -> Result<Option<Vec<ReleasePackage>>> {
        self.inner.find(&Self::key(job, PackageSlot::All)).await
    }

    pub async fn save_all_for_release_job(
        &self,
        job: &ReleaseJob,
        packages: Vec<ReleasePackage>,
    ) -> Result<()> {
        self.inner.save(Self::key(job, PackageSlot::All), packages).await
    }
}
