//! Deployment-side data model: jobs that reference templates, and instances.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A job as placed by a deployment: an ordered list of templates to render together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentJob {
    pub name: String,
    #[serde(default)]
    pub templates: Vec<Template>,
}

impl DeploymentJob {
    /// Convenience constructor from template names.
    pub fn new<I, S>(name: impl Into<String>, templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            templates: templates.into_iter().map(Template::new).collect(),
        }
    }
}

/// Reference to a release job template by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
}

impl Template {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A concrete deployment target. Only its identity matters to the cache; its
/// properties feed the renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub job_name: String,
    pub index: u32,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl Instance {
    pub fn new(job_name: impl Into<String>, index: u32) -> Self {
        Self {
            job_name: job_name.into(),
            index,
            properties: serde_json::Map::new(),
        }
    }

    /// Attach instance properties. Non-object values are ignored.
    #[must_use]
    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = properties {
            self.properties = map;
        }
        self
    }

    /// Identity used in cache keys, `<job_name>/<index>`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.job_name, self.index)
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
