//! Consistent read snapshots for resolution passes.
//!
//! A resolution pass reads providers across deployment boundaries
//! (shared links), so it must not observe another deployment's
//! registration half-applied. `RegistrySnapshot` wraps one redb read
//! transaction: everything read through it reflects a single point in
//! time, regardless of concurrent writes.

use redb::{ReadTransaction, ReadableTable};

use tether_core::{LinkDefinition, LinkKey};

use crate::error::{StateError, StateResult};
use crate::tables::PROVIDERS;
use crate::types::ProviderRecord;

/// Point-in-time view of the provider registry.
///
/// Deliberately narrow: it exposes only the two queries resolution
/// needs. Visibility and consumability filtering happen in the
/// resolver, which also wants the near-misses for diagnostics.
pub struct RegistrySnapshot {
    txn: ReadTransaction,
}

impl RegistrySnapshot {
    pub(crate) fn new(txn: ReadTransaction) -> Self {
        Self { txn }
    }

    /// Every provider row matching a definition, across all
    /// deployments, in key order. Includes unshared and
    /// non-consumable rows.
    pub fn providers_by_definition(
        &self,
        definition: &LinkDefinition,
    ) -> StateResult<Vec<ProviderRecord>> {
        let table = self
            .txn
            .open_table(PROVIDERS)
            .map_err(|e| StateError::Table(e.to_string()))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(|e| StateError::Read(e.to_string()))? {
            let (_, value) = entry.map_err(|e| StateError::Read(e.to_string()))?;
            let record: ProviderRecord = serde_json::from_slice(value.value())
                .map_err(|e| StateError::Decode(e.to_string()))?;
            if record.definition == *definition {
                results.push(record);
            }
        }
        Ok(results)
    }

    /// The provider row with this exact composite key, if any.
    pub fn provider_by_key(&self, key: &LinkKey) -> StateResult<Option<ProviderRecord>> {
        let table = self
            .txn
            .open_table(PROVIDERS)
            .map_err(|e| StateError::Table(e.to_string()))?;
        match table
            .get(key.to_string().as_str())
            .map_err(|e| StateError::Read(e.to_string()))?
        {
            Some(guard) => {
                let record: ProviderRecord = serde_json::from_slice(guard.value())
                    .map_err(|e| StateError::Decode(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }
}
