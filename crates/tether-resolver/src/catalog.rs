//! The provider view a resolution pass reads from.
//!
//! Resolution must see a consistent provider registry, including
//! providers owned by other deployments (shared links). That view is
//! passed in explicitly rather than reached through the store, so the
//! pass stays a pure function of (catalog, consumer set).

use tether_core::{LinkDefinition, LinkKey};
use tether_state::{ProviderRecord, RegistrySnapshot, StateResult};

/// Read-only provider queries the resolver needs.
///
/// Implementations return raw rows; visibility and consumability
/// rules are applied by the resolver, which also wants the
/// near-misses for diagnostics.
pub trait ProviderCatalog {
    /// Every provider matching a definition, across all deployments.
    fn providers_by_definition(
        &self,
        definition: &LinkDefinition,
    ) -> StateResult<Vec<ProviderRecord>>;

    /// The provider with this exact composite key, if any.
    fn provider_by_key(&self, key: &LinkKey) -> StateResult<Option<ProviderRecord>>;
}

impl ProviderCatalog for RegistrySnapshot {
    fn providers_by_definition(
        &self,
        definition: &LinkDefinition,
    ) -> StateResult<Vec<ProviderRecord>> {
        RegistrySnapshot::providers_by_definition(self, definition)
    }

    fn provider_by_key(&self, key: &LinkKey) -> StateResult<Option<ProviderRecord>> {
        RegistrySnapshot::provider_by_key(self, key)
    }
}

/// Catalog over a plain provider list, for tests and offline
/// evaluation of a resolution pass without a store.
#[derive(Debug, Default, Clone)]
pub struct StaticCatalog {
    providers: Vec<ProviderRecord>,
}

impl StaticCatalog {
    pub fn new(providers: Vec<ProviderRecord>) -> Self {
        Self { providers }
    }
}

impl ProviderCatalog for StaticCatalog {
    fn providers_by_definition(
        &self,
        definition: &LinkDefinition,
    ) -> StateResult<Vec<ProviderRecord>> {
        Ok(self
            .providers
            .iter()
            .filter(|p| p.definition == *definition)
            .cloned()
            .collect())
    }

    fn provider_by_key(&self, key: &LinkKey) -> StateResult<Option<ProviderRecord>> {
        Ok(self.providers.iter().find(|p| p.key == *key).cloned())
    }
}
