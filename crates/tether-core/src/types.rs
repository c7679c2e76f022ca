//! Shared types used across Tether crates.

use serde::{Deserialize, Serialize};

use crate::keys::LinkKey;
use crate::owner::OwnerRef;

/// Opaque link content, already secret-interpolated upstream.
pub type LinkContent = serde_json::Map<String, serde_json::Value>;

/// The matching key consumers use to find providers.
///
/// `kind` is the link type (e.g. `mysql`); `name` is the published
/// name, which may be an alias differing from the link name in the
/// provider's composite key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

impl LinkDefinition {
    pub fn new(kind: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }
}

impl std::fmt::Display for LinkDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "type '{}' name '{}'", self.kind, self.name)
    }
}

/// What a consumer asks for. Exactly one of three forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Requirement {
    /// Match any visible provider with this definition.
    Implicit {
        definition: LinkDefinition,
        #[serde(default)]
        overrides: LinkContent,
    },
    /// Match one specific provider by its composite key.
    Pinned {
        provider: LinkKey,
        definition: LinkDefinition,
        #[serde(default)]
        overrides: LinkContent,
    },
    /// Supply content inline and bypass matching entirely.
    Manual { content: LinkContent },
}

impl Requirement {
    pub fn is_manual(&self) -> bool {
        matches!(self, Requirement::Manual { .. })
    }
}

/// A capability to publish, as declared by the current manifest.
///
/// Handed over per deploy apply by the manifest parser. `display_name`
/// is the name originally declared in the job definition and is kept
/// for debugging only; consumers match on `definition`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub instance_group: String,
    pub job: String,
    pub link_name: String,
    pub display_name: String,
    pub definition: LinkDefinition,
    pub shared: bool,
    pub content: LinkContent,
    pub owner: OwnerRef,
}

impl ProviderSpec {
    /// Composite identity of this provider within `deployment`.
    pub fn key(&self, deployment: &str) -> LinkKey {
        LinkKey::new(deployment, &self.instance_group, &self.job, &self.link_name)
    }
}

/// A requirement to satisfy, as declared by the current manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerSpec {
    pub instance_group: String,
    pub job: String,
    pub link_name: String,
    pub requirement: Requirement,
    pub owner: OwnerRef,
}

impl ConsumerSpec {
    /// Composite identity of this consumer within `deployment`.
    pub fn key(&self, deployment: &str) -> LinkKey {
        LinkKey::new(deployment, &self.instance_group, &self.job, &self.link_name)
    }
}
