//! Release-side data model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A versioned bundle of job definitions and packages.
///
/// `packages` keeps `None` entries as they appear in the source manifest so a
/// malformed release can be rejected instead of silently shrinking the package set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub jobs: Vec<ReleaseJob>,
    #[serde(default)]
    pub packages: Vec<Option<ReleasePackage>>,
}

impl Release {
    /// Load a release manifest from a YAML file.
    ///
    /// Relative `tar_path` entries are resolved against the manifest's directory.
    pub fn from_yaml_file(path: &std::path::Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Reading release manifest {}", path.display()))?;
        let mut release: Release = serde_yaml::from_str(&content)
            .with_context(|| format!("Parsing release manifest {}", path.display()))?;

        if let Some(base) = path.parent() {
            for job in &mut release.jobs {
                if job.tar_path.is_relative() {
                    job.tar_path = base.join(&job.tar_path);
                }
            }
            for pkg in release.packages.iter_mut().flatten() {
                if pkg.tar_path.is_relative() {
                    pkg.tar_path = base.join(&pkg.tar_path);
                }
            }
        }

        Ok(release)
    }
}

/// A job shipped by a release: a source tarball plus the template names it defines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseJob {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub fingerprint: String,
    pub tar_path: PathBuf,
    /// Template names deployments use to refer to this job. Defaults to the job name.
    #[serde(default)]
    pub templates: Vec<String>,
}

impl ReleaseJob {
    /// Identity used as the key of job source records and package lists.
    pub fn key(&self) -> ReleaseJobKey {
        ReleaseJobKey {
            name: self.name.clone(),
            version: self.version.clone(),
            fingerprint: self.fingerprint.clone(),
        }
    }

    /// Template names this job answers to.
    pub fn template_names(&self) -> Vec<String> {
        if self.templates.is_empty() {
            vec![self.name.clone()]
        } else {
            self.templates.clone()
        }
    }
}

/// Identity of a release job. Two jobs with the same name but different
/// fingerprints are different jobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReleaseJobKey {
    pub name: String,
    pub version: String,
    pub fingerprint: String,
}

impl fmt::Display for ReleaseJobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)?;
        if !self.fingerprint.is_empty() {
            write!(f, "#{}", self.fingerprint)?;
        }
        Ok(())
    }
}

/// A package shipped by a release. Membership in a job's runtime set is decided by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasePackage {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub tar_path: PathBuf,
}

impl ReleasePackage {
    /// Package with only a name, as most tests need.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
