//! Typed decoding of the legacy nested-map formats.
//!
//! Provider form, per deployment:
//! `{instance_group: {job: {link_name: {type: content}}}}`
//!
//! Consumer form, per instance (scoped by that instance's deployment
//! and instance group): `{job: {link_name: consumer_link_data}}`
//!
//! Both are untyped trees of historical data. Decoding walks them
//! level by level and drops anything that is not the expected shape,
//! counting the drops so callers can report them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use tether_core::{ConsumerSpec, LinkContent, LinkDefinition, LinkKey, OwnerRef, ProviderSpec, Requirement};

/// One deployment's embedded link spec, as exported from the old
/// schema. A missing spec decodes as empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyDeploymentExport {
    pub name: String,
    #[serde(default)]
    pub link_spec: Value,
}

/// One instance's embedded consumed-links map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyInstanceExport {
    pub deployment: String,
    pub instance_group: String,
    #[serde(default)]
    pub links: Value,
}

/// A decoded legacy provider leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyProviderEntry {
    pub deployment: String,
    pub instance_group: String,
    pub job: String,
    pub link_name: String,
    pub link_type: String,
    pub content: LinkContent,
}

impl LegacyProviderEntry {
    pub fn key(&self) -> LinkKey {
        LinkKey::new(&self.deployment, &self.instance_group, &self.job, &self.link_name)
    }

    /// Registration spec for this entry. Legacy links were implicitly
    /// globally shared and stay consumable.
    pub fn to_spec(&self) -> ProviderSpec {
        ProviderSpec {
            instance_group: self.instance_group.clone(),
            job: self.job.clone(),
            link_name: self.link_name.clone(),
            display_name: self.link_name.clone(),
            definition: LinkDefinition::new(&self.link_type, &self.link_name),
            shared: true,
            content: self.content.clone(),
            owner: OwnerRef::job(&self.job, &self.instance_group),
        }
    }
}

/// A decoded legacy consumer leaf. `content` is the instance's
/// resolved link data, the only requirement shape legacy data has.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyConsumerEntry {
    pub deployment: String,
    pub instance_group: String,
    pub job: String,
    pub link_name: String,
    pub content: LinkContent,
}

impl LegacyConsumerEntry {
    pub fn key(&self) -> LinkKey {
        LinkKey::new(&self.deployment, &self.instance_group, &self.job, &self.link_name)
    }

    /// Registration spec for this entry. The legacy data records what
    /// the consumer received, not what it asked for, so the closest
    /// faithful requirement is a manual link carrying that content.
    /// The first post-migration deploy replaces it with the real
    /// requirement from the manifest.
    pub fn to_spec(&self) -> ConsumerSpec {
        ConsumerSpec {
            instance_group: self.instance_group.clone(),
            job: self.job.clone(),
            link_name: self.link_name.clone(),
            requirement: Requirement::Manual {
                content: self.content.clone(),
            },
            owner: OwnerRef::job(&self.job, &self.instance_group),
        }
    }
}

/// Walk a deployment's legacy link spec into provider entries.
/// Returns the entries plus the number of malformed nodes dropped.
pub fn decode_provider_entries(export: &LegacyDeploymentExport) -> (Vec<LegacyProviderEntry>, u32) {
    let mut entries = Vec::new();
    let mut skipped = 0;

    let Some(groups) = as_map(&export.link_spec, &export.name, "link spec", &mut skipped) else {
        return (entries, skipped);
    };
    for (instance_group, jobs) in groups {
        let Some(jobs) = as_map(jobs, &export.name, "instance group", &mut skipped) else {
            continue;
        };
        for (job, link_names) in jobs {
            let Some(link_names) = as_map(link_names, &export.name, "job", &mut skipped) else {
                continue;
            };
            for (link_name, link_types) in link_names {
                let Some(link_types) = as_map(link_types, &export.name, "link name", &mut skipped)
                else {
                    continue;
                };
                for (link_type, content) in link_types {
                    let Some(content) = as_map(content, &export.name, "content", &mut skipped)
                    else {
                        continue;
                    };
                    entries.push(LegacyProviderEntry {
                        deployment: export.name.clone(),
                        instance_group: instance_group.clone(),
                        job: job.clone(),
                        link_name: link_name.clone(),
                        link_type: link_type.clone(),
                        content: content.clone(),
                    });
                }
            }
        }
    }
    (entries, skipped)
}

/// Walk an instance's legacy consumed-links map into consumer entries.
pub fn decode_consumer_entries(export: &LegacyInstanceExport) -> (Vec<LegacyConsumerEntry>, u32) {
    let mut entries = Vec::new();
    let mut skipped = 0;

    let Some(jobs) = as_map(&export.links, &export.deployment, "links", &mut skipped) else {
        return (entries, skipped);
    };
    for (job, links) in jobs {
        let Some(links) = as_map(links, &export.deployment, "job links", &mut skipped) else {
            continue;
        };
        for (link_name, content) in links {
            let Some(content) = as_map(content, &export.deployment, "link data", &mut skipped)
            else {
                continue;
            };
            entries.push(LegacyConsumerEntry {
                deployment: export.deployment.clone(),
                instance_group: export.instance_group.clone(),
                job: job.clone(),
                link_name: link_name.clone(),
                content: content.clone(),
            });
        }
    }
    (entries, skipped)
}

/// Expect an object node; a missing node is treated as empty, any
/// other shape is dropped with a warning.
fn as_map<'a>(
    value: &'a Value,
    deployment: &str,
    node: &str,
    skipped: &mut u32,
) -> Option<&'a LinkContent> {
    match value {
        Value::Object(map) => Some(map),
        Value::Null => None,
        other => {
            warn!(
                deployment,
                node,
                found = %json_type(other),
                "malformed legacy link entry skipped"
            );
            *skipped += 1;
            None
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_nested_provider_leaves() {
        let export = LegacyDeploymentExport {
            name: "d1".to_string(),
            link_spec: json!({
                "ig": {
                    "mysql": {
                        "db": {
                            "mysql": {"address": "10.0.0.5"}
                        }
                    }
                }
            }),
        };

        let (entries, skipped) = decode_provider_entries(&export);
        assert_eq!(skipped, 0);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key().to_string(), "d1.ig.mysql.db");
        assert_eq!(entries[0].link_type, "mysql");
        assert_eq!(entries[0].content["address"], "10.0.0.5");

        let spec = entries[0].to_spec();
        assert!(spec.shared);
        assert_eq!(spec.definition, LinkDefinition::new("mysql", "db"));
        assert_eq!(spec.owner, OwnerRef::job("mysql", "ig"));
    }

    #[test]
    fn missing_link_spec_decodes_as_empty() {
        let export = LegacyDeploymentExport {
            name: "d1".to_string(),
            link_spec: Value::Null,
        };
        let (entries, skipped) = decode_provider_entries(&export);
        assert!(entries.is_empty());
        assert_eq!(skipped, 0);
    }

    #[test]
    fn malformed_nodes_are_dropped_not_fatal() {
        let export = LegacyDeploymentExport {
            name: "d1".to_string(),
            link_spec: json!({
                "ig": {
                    "mysql": {
                        "db": {"mysql": {"address": "10.0.0.5"}},
                        "broken": "not an object"
                    },
                    "junk": 42
                }
            }),
        };

        let (entries, skipped) = decode_provider_entries(&export);
        assert_eq!(entries.len(), 1);
        assert_eq!(skipped, 2);
    }

    #[test]
    fn consumer_entries_carry_instance_scope() {
        let export = LegacyInstanceExport {
            deployment: "d2".to_string(),
            instance_group: "web".to_string(),
            links: json!({
                "app": {
                    "db": {"address": "10.0.0.5", "port": 3306}
                }
            }),
        };

        let (entries, skipped) = decode_consumer_entries(&export);
        assert_eq!(skipped, 0);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key().to_string(), "d2.web.app.db");

        let spec = entries[0].to_spec();
        match spec.requirement {
            Requirement::Manual { content } => assert_eq!(content["port"], 3306),
            other => panic!("unexpected requirement: {other:?}"),
        }
    }
}
