//! Rendering context for one job template on one instance.
//!
//! Templates see two top-level values:
//!
//! - `spec` - `{ job_name, index, name }`: the instance's deployment job, its index
//!   and the name of the release job being rendered
//! - `properties` - the job's declared property defaults overlaid with the
//!   instance's properties, dotted names expanded into nested objects
//!
//! ```text
//! declared:  router.port (default 8080), router.host (no default)
//! instance:  { "router": { "host": "10.0.0.1" } }
//! context:   properties.router.port = 8080, properties.router.host = "10.0.0.1"
//! ```

use anyhow::{Context, Result};
use serde_json::{Map, Value, json};
use tera::Context as TeraContext;

use crate::models::{Instance, JobDescription};

/// Build the Tera context used to render `job`'s templates for `instance`.
pub fn build_context(job: &JobDescription, instance: &Instance) -> Result<TeraContext> {
    let mut properties = Value::Object(Map::new());

    for (name, definition) in &job.properties {
        if let Some(default) = &definition.default {
            insert_dotted(&mut properties, name, default.clone());
        }
    }
    for (name, value) in &instance.properties {
        insert_dotted(&mut properties, name, value.clone());
    }

    let value = json!({
        "spec": {
            "job_name": instance.job_name,
            "index": instance.index,
            "name": job.name,
        },
        "properties": properties,
    });

    TeraContext::from_value(value)
        .with_context(|| format!("Building render context for job '{}'", job.name))
}

/// Set `path` (dot separated) inside `target`, creating intermediate objects.
///
/// Objects are merged key by key so an instance can override one nested default
/// without discarding its siblings; any other value replaces what was there.
fn insert_dotted(target: &mut Value, path: &str, value: Value) {
    let mut current = target;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };

        if segments.peek().is_none() {
            let merge = matches!(
                (map.get(segment), &value),
                (Some(Value::Object(_)), Value::Object(_))
            );
            if merge {
                if let (Some(existing), Value::Object(incoming)) = (map.get_mut(segment), value) {
                    for (key, nested) in incoming {
                        insert_dotted(existing, &key, nested);
                    }
                }
            } else {
                map.insert(segment.to_string(), value);
            }
            return;
        }

        current = map.entry(segment.to_string()).or_insert_with(|| Value::Object(Map::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PropertyDefinition;
    use std::collections::BTreeMap;

    fn router_job() -> JobDescription {
        JobDescription {
            name: "router".to_string(),
            properties: BTreeMap::from([
                (
                    "router.port".to_string(),
                    PropertyDefinition {
                        description: None,
                        default: Some(json!(8080)),
                    },
                ),
                (
                    "router.host".to_string(),
                    PropertyDefinition::default(),
                ),
            ]),
            ..JobDescription::default()
        }
    }

    #[test]
    fn test_defaults_are_nested() {
        let ctx = build_context(&router_job(), &Instance::new("web", 2)).unwrap();
        let value = ctx.into_json();

        assert_eq!(value["properties"]["router"]["port"], json!(8080));
        assert!(value["properties"]["router"].get("host").is_none());
        assert_eq!(value["spec"], json!({"job_name": "web", "index": 2, "name": "router"}));
    }

    #[test]
    fn test_instance_overrides_merge_with_defaults() {
        let instance =
            Instance::new("web", 0).with_properties(json!({"router": {"host": "10.0.0.1"}}));
        let value = build_context(&router_job(), &instance).unwrap().into_json();

        assert_eq!(value["properties"]["router"]["port"], json!(8080));
        assert_eq!(value["properties"]["router"]["host"], json!("10.0.0.1"));
    }

    #[test]
    fn test_dotted_instance_property_overrides_default() {
        let instance = Instance::new("web", 0).with_properties(json!({"router.port": 9090}));
        let value = build_context(&router_job(), &instance).unwrap().into_json();

        assert_eq!(value["properties"]["router"]["port"], json!(9090));
    }

    #[test]
    fn test_scalar_replaced_by_nested_value() {
        let mut target = json!({});
        insert_dotted(&mut target, "a", json!(1));
        insert_dotted(&mut target, "a.b", json!(2));
        assert_eq!(target, json!({"a": {"b": 2}}));
    }
}
