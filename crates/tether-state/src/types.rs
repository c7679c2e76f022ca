//! Persisted row types for the Tether registry store.
//!
//! Rows carry the composite [`LinkKey`] as their identity; the key
//! embeds the owning deployment, which is what makes per-deployment
//! uniqueness and cascade deletion fall out of plain key prefixes.

use serde::{Deserialize, Serialize};

use tether_core::{ConsumerSpec, LinkContent, LinkDefinition, LinkKey, OwnerRef, ProviderSpec, Requirement};

/// A deployment known to the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentRecord {
    pub name: String,
    pub created_at: u64,
    pub updated_at: u64,
}

/// A published capability.
///
/// `consumable` gates eligibility for new bindings: it flips to false
/// when the publishing job disappears from the manifest, while links
/// already bound to the provider stay valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderRecord {
    pub key: LinkKey,
    /// Name originally declared in the job definition. Debug only.
    pub display_name: String,
    /// Visible to consumers outside the owning deployment.
    pub shared: bool,
    /// Eligible for new bindings.
    pub consumable: bool,
    pub content: LinkContent,
    /// The matching key consumers look up.
    pub definition: LinkDefinition,
    pub owner: OwnerRef,
    pub created_at: u64,
    pub updated_at: u64,
}

impl ProviderRecord {
    pub fn deployment(&self) -> &str {
        &self.key.deployment
    }

    pub fn from_spec(deployment: &str, spec: &ProviderSpec, now: u64) -> Self {
        ProviderRecord {
            key: spec.key(deployment),
            display_name: spec.display_name.clone(),
            shared: spec.shared,
            consumable: true,
            content: spec.content.clone(),
            definition: spec.definition.clone(),
            owner: spec.owner.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A declared requirement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsumerRecord {
    pub key: LinkKey,
    pub requirement: Requirement,
    pub owner: OwnerRef,
    /// Declaration position within its deploy, for reproducible
    /// diagnostics ordering.
    pub ordinal: u32,
    pub created_at: u64,
    pub updated_at: u64,
}

impl ConsumerRecord {
    pub fn deployment(&self) -> &str {
        &self.key.deployment
    }

    pub fn from_spec(deployment: &str, spec: &ConsumerSpec, ordinal: u32, now: u64) -> Self {
        ConsumerRecord {
            key: spec.key(deployment),
            requirement: spec.requirement.clone(),
            owner: spec.owner.clone(),
            ordinal,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A resolved binding between one consumer and at most one provider.
///
/// `provider` is None for manual links and for backfilled legacy
/// content; downstream readers never special-case either.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkRecord {
    pub consumer: LinkKey,
    pub provider: Option<LinkKey>,
    /// Materialized content with consumer overrides applied.
    pub content_snapshot: LinkContent,
    pub created_at: u64,
    pub updated_at: u64,
}

impl LinkRecord {
    pub fn deployment(&self) -> &str {
        &self.consumer.deployment
    }

    /// True when `other` binds the same provider with the same
    /// materialized content, i.e. a re-resolution that changed nothing.
    pub fn same_binding(&self, other: &LinkRecord) -> bool {
        self.provider == other.provider && self.content_snapshot == other.content_snapshot
    }

    /// True when this link references a provider in `deployment`.
    pub fn references_deployment(&self, deployment: &str) -> bool {
        self.consumer.deployment == deployment
            || self
                .provider
                .as_ref()
                .is_some_and(|p| p.deployment == deployment)
    }
}
