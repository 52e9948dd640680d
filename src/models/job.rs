//! Structured description of a job, as read from its source archive.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// On-disk shape of the `job.MF` manifest inside a job source tarball.
///
/// ```yaml
/// name: router
/// templates:
///   router.conf.tera: config/router.conf
/// packages:
/// - router-pkg
/// properties:
///   router.port:
///     description: Listening port
///     default: 8080
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobManifest {
    pub name: String,
    /// Template source (relative to `templates/`) mapped to its rendered destination.
    #[serde(default)]
    pub templates: BTreeMap<String, String>,
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyDefinition>,
}

/// A property a job declares, with an optional default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

/// Runtime package a job declares by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageRef {
    pub name: String,
}

/// One template of a job with its source already loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTemplate {
    pub source: String,
    pub destination: String,
    pub content: String,
}

/// Materialized job: everything the renderer and the package resolver need.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDescription {
    pub name: String,
    pub templates: Vec<JobTemplate>,
    pub packages: Vec<PackageRef>,
    pub properties: BTreeMap<String, PropertyDefinition>,
}

impl JobDescription {
    /// Build a description from a parsed manifest and loaded template sources.
    ///
    /// `load` is called once per template source path; templates come out in
    /// manifest (sorted source) order.
    pub fn from_manifest<F>(manifest: JobManifest, mut load: F) -> anyhow::Result<Self>
    where
        F: FnMut(&str) -> anyhow::Result<String>,
    {
        let mut templates = Vec::with_capacity(manifest.templates.len());
        for (source, destination) in manifest.templates {
            let content = load(&source)?;
            templates.push(JobTemplate {
                source,
                destination,
                content,
            });
        }

        Ok(Self {
            name: manifest.name,
            templates,
            packages: manifest
                .packages
                .into_iter()
                .map(|name| PackageRef { name })
                .collect(),
            properties: manifest.properties,
        })
    }

    /// Names of the packages this job declares.
    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.packages.iter().map(|p| p.name.as_str())
    }
}
