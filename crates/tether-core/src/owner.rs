//! Tagged owner references.
//!
//! A link is published or consumed on behalf of some owning object,
//! today a job or a persistent disk. New kinds become new variants,
//! not open-ended attributes.

use serde::{Deserialize, Serialize};

/// The object a provider or consumer belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OwnerRef {
    Job {
        name: String,
        instance_group: Option<String>,
    },
    Disk {
        name: String,
    },
}

impl OwnerRef {
    pub fn job(name: &str, instance_group: &str) -> Self {
        OwnerRef::Job {
            name: name.to_string(),
            instance_group: Some(instance_group.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            OwnerRef::Job { name, .. } | OwnerRef::Disk { name } => name,
        }
    }

    /// Human-readable owner description used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            OwnerRef::Job {
                name,
                instance_group: Some(ig),
            } => format!("job '{name}' in instance group '{ig}'"),
            OwnerRef::Job {
                name,
                instance_group: None,
            } => format!("job '{name}'"),
            OwnerRef::Disk { name } => format!("disk '{name}'"),
        }
    }
}
