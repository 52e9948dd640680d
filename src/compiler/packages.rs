//! Runtime package association: which of a release's packages a job needs.

use anyhow::{Context, Result};
use std::collections::HashSet;

use super::TemplatesCompiler;
use crate::core::TplError;
use crate::models::{JobDescription, ReleaseJob, ReleasePackage};

/// Keep the packages of `all` whose name `declared` mentions.
///
/// Output follows the order of `all`, with at most one package per name. Declared
/// names nothing in `all` matches are dropped and returned separately.
pub fn filter_packages<'a, I>(
    all: &[ReleasePackage],
    declared: I,
) -> (Vec<ReleasePackage>, Vec<String>)
where
    I: IntoIterator<Item = &'a str>,
{
    let declared: Vec<&str> = declared.into_iter().collect();
    let wanted: HashSet<&str> = declared.iter().copied().collect();

    let mut included = HashSet::new();
    let mut packages = Vec::new();
    for pkg in all {
        if wanted.contains(pkg.name.as_str()) && included.insert(pkg.name.as_str()) {
            packages.push(pkg.clone());
        }
    }

    let mut unmatched = Vec::new();
    for name in declared {
        if !included.contains(name) && !unmatched.iter().any(|n: &String| n == name) {
            unmatched.push(name.to_string());
        }
    }

    (packages, unmatched)
}

impl TemplatesCompiler {
    /// Memoize the runtime package list of `release_job` from the names `job`
    /// declares.
    ///
    /// The first resolution filters the release's full package list and saves the
    /// result; once a list is saved it is authoritative and never recomputed.
    pub(super) async fn associate_packages(
        &self,
        release_job: &ReleaseJob,
        job: &JobDescription,
    ) -> Result<()> {
        let key = release_job.key();
        let _guard = self.locks.acquire(format!("packages:{key}")).await?;

        let memoized = self
            .runtime_packages
            .find_by_release_job(release_job)
            .await
            .with_context(|| format!("Finding runtime deps for {}", key))?;
        if memoized.is_some() {
            tracing::debug!("Runtime packages for {} already resolved", key);
            return Ok(());
        }

        let all = self
            .runtime_packages
            .find_all_by_release_job(release_job)
            .await
            .with_context(|| format!("Finding rel-job -> rel-pkgs {}", key))?
            .ok_or_else(|| TplError::expected("rel-job -> rel-pkgs", key.to_string()))?;

        let (packages, unmatched) = filter_packages(&all, job.package_names());
        for name in &unmatched {
            tracing::debug!(
                "Job {} declares package '{}' which the release does not ship",
                key,
                name
            );
        }

        tracing::debug!(
            "Resolved {} runtime package(s) for {}: [{}]",
            packages.len(),
            key,
            packages.iter().map(|p| p.name.as_str()).collect::<Vec<_>>().join(", ")
        );
        self.runtime_packages
            .save_for_release_job(release_job, packages)
            .await
            .with_context(|| format!("Saving job packages {}", key))
    }
}
