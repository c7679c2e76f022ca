//! LinkStore — redb-backed persistence for link registrations.
//!
//! Hosts the provider registry, the consumer registry, and resolved
//! link storage. All rows are JSON-serialized into redb's `&[u8]`
//! value columns. The store supports both on-disk and in-memory
//! backends (the latter for testing).
//!
//! Registration operations are upserts keyed by the composite link
//! key, so a re-published provider or re-declared consumer replaces
//! its row instead of duplicating it. Deployment deletion cascades to
//! providers, consumers, and any link referencing either, inside one
//! write transaction.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use tether_core::{ConsumerSpec, LinkDefinition, LinkKey, ProviderSpec};

use crate::error::{StateError, StateResult};
use crate::snapshot::RegistrySnapshot;
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Visibility scope for provider candidate queries.
#[derive(Debug, Clone, Copy)]
pub enum ProviderScope<'a> {
    /// Providers owned by this deployment only.
    Deployment(&'a str),
    /// Providers owned by this deployment, plus shared providers
    /// from any other deployment.
    VisibleTo(&'a str),
}

impl ProviderScope<'_> {
    fn admits(&self, provider: &ProviderRecord) -> bool {
        match self {
            ProviderScope::Deployment(name) => provider.deployment() == *name,
            ProviderScope::VisibleTo(name) => {
                provider.deployment() == *name || provider.shared
            }
        }
    }
}

/// Outcome counts of an atomic link commit.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CommitStats {
    pub created: u32,
    pub updated: u32,
    pub unchanged: u32,
}

/// Thread-safe registry store backed by redb.
#[derive(Clone)]
pub struct LinkStore {
    db: Arc<Database>,
}

/// Prefix matching every composite key owned by `deployment`.
fn deployment_prefix(deployment: &str) -> String {
    format!("{deployment}.")
}

impl LinkStore {
    /// Open (or create) a persistent registry store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "link store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory registry store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory link store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        txn.open_table(PROVIDERS).map_err(map_err!(Table))?;
        txn.open_table(CONSUMERS).map_err(map_err!(Table))?;
        txn.open_table(LINKS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Open a consistent read snapshot over every deployment's
    /// registrations, for a resolution pass.
    pub fn snapshot(&self) -> StateResult<RegistrySnapshot> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        Ok(RegistrySnapshot::new(txn))
    }

    // ── Deployments ────────────────────────────────────────────────

    /// Insert the deployment row if it doesn't exist yet.
    pub fn ensure_deployment(&self, name: &str, now: u64) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
            if table.get(name).map_err(map_err!(Read))?.is_none() {
                let record = DeploymentRecord {
                    name: name.to_string(),
                    created_at: now,
                    updated_at: now,
                };
                let value = serde_json::to_vec(&record).map_err(map_err!(Encode))?;
                table
                    .insert(name, value.as_slice())
                    .map_err(map_err!(Write))?;
                debug!(deployment = name, "deployment registered");
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a deployment row by name.
    pub fn get_deployment(&self, name: &str) -> StateResult<Option<DeploymentRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        match table.get(name).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: DeploymentRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Decode))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List all deployments.
    pub fn list_deployments(&self) -> StateResult<Vec<DeploymentRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: DeploymentRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Decode))?;
            results.push(record);
        }
        Ok(results)
    }

    /// Delete a deployment, cascading to its providers, its consumers,
    /// and every link whose consumer or bound provider belonged to it.
    /// One write transaction; returns true if the deployment existed.
    pub fn delete_deployment(&self, name: &str) -> StateResult<bool> {
        let prefix = deployment_prefix(name);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut deployments = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
            existed = deployments.remove(name).map_err(map_err!(Write))?.is_some();

            let mut providers = txn.open_table(PROVIDERS).map_err(map_err!(Table))?;
            for key in collect_keys_with_prefix(&providers, &prefix)? {
                providers.remove(key.as_str()).map_err(map_err!(Write))?;
            }

            let mut consumers = txn.open_table(CONSUMERS).map_err(map_err!(Table))?;
            for key in collect_keys_with_prefix(&consumers, &prefix)? {
                consumers.remove(key.as_str()).map_err(map_err!(Write))?;
            }

            // Links can reference the deployment from either side, so
            // this is a full scan rather than a prefix scan.
            let mut links = txn.open_table(LINKS).map_err(map_err!(Table))?;
            let doomed: Vec<String> = {
                let mut keys = Vec::new();
                for entry in links.iter().map_err(map_err!(Read))? {
                    let (key, value) = entry.map_err(map_err!(Read))?;
                    let link: LinkRecord =
                        serde_json::from_slice(value.value()).map_err(map_err!(Decode))?;
                    if link.references_deployment(name) {
                        keys.push(key.value().to_string());
                    }
                }
                keys
            };
            for key in doomed {
                links.remove(key.as_str()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(deployment = name, existed, "deployment deleted");
        Ok(existed)
    }

    // ── Provider registry ──────────────────────────────────────────

    /// Upsert a provider by its composite key.
    ///
    /// A re-published provider replaces its row (metadata and content)
    /// and becomes consumable again; `created_at` is preserved.
    pub fn register_provider(
        &self,
        deployment: &str,
        spec: &ProviderSpec,
        now: u64,
    ) -> StateResult<LinkKey> {
        let mut record = ProviderRecord::from_spec(deployment, spec, now);
        let key = record.key.to_string();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(PROVIDERS).map_err(map_err!(Table))?;
            if let Some(guard) = table.get(key.as_str()).map_err(map_err!(Read))? {
                let existing: ProviderRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Decode))?;
                record.created_at = existing.created_at;
            }
            let value = serde_json::to_vec(&record).map_err(map_err!(Encode))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(provider = %key, shared = record.shared, "provider registered");
        Ok(record.key)
    }

    /// Get a provider by its composite key.
    pub fn find_provider_by_key(&self, key: &LinkKey) -> StateResult<Option<ProviderRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PROVIDERS).map_err(map_err!(Table))?;
        match table.get(key.to_string().as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: ProviderRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Decode))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Consumable providers matching a definition, under a visibility
    /// scope. Results come back in key order (deployment name first).
    pub fn find_providers_by_definition(
        &self,
        definition: &LinkDefinition,
        scope: ProviderScope<'_>,
    ) -> StateResult<Vec<ProviderRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PROVIDERS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: ProviderRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Decode))?;
            if record.consumable && record.definition == *definition && scope.admits(&record) {
                results.push(record);
            }
        }
        Ok(results)
    }

    /// List all providers for a deployment, consumable or not.
    pub fn list_providers_for_deployment(
        &self,
        deployment: &str,
    ) -> StateResult<Vec<ProviderRecord>> {
        let prefix = deployment_prefix(deployment);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PROVIDERS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                let record: ProviderRecord =
                    serde_json::from_slice(value.value()).map_err(map_err!(Decode))?;
                results.push(record);
            }
        }
        Ok(results)
    }

    /// Flag providers of `deployment` absent from `current` as no
    /// longer consumable. Rows are never deleted here: links may still
    /// reference them. Returns the number of providers deactivated.
    pub fn deactivate_missing_providers(
        &self,
        deployment: &str,
        current: &[LinkKey],
        now: u64,
    ) -> StateResult<u32> {
        let keep: HashSet<String> = current.iter().map(|k| k.to_string()).collect();
        let prefix = deployment_prefix(deployment);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut deactivated = 0;
        {
            let mut table = txn.open_table(PROVIDERS).map_err(map_err!(Table))?;
            let stale: Vec<(String, ProviderRecord)> = {
                let mut rows = Vec::new();
                for entry in table.iter().map_err(map_err!(Read))? {
                    let (key, value) = entry.map_err(map_err!(Read))?;
                    let key = key.value().to_string();
                    if !key.starts_with(&prefix) || keep.contains(&key) {
                        continue;
                    }
                    let record: ProviderRecord =
                        serde_json::from_slice(value.value()).map_err(map_err!(Decode))?;
                    if record.consumable {
                        rows.push((key, record));
                    }
                }
                rows
            };
            for (key, mut record) in stale {
                record.consumable = false;
                record.updated_at = now;
                let value = serde_json::to_vec(&record).map_err(map_err!(Encode))?;
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
                deactivated += 1;
                debug!(provider = %key, "provider deactivated");
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(deactivated)
    }

    // ── Consumer registry ──────────────────────────────────────────

    /// Upsert a consumer by its composite key, recording its
    /// declaration position. `created_at` is preserved on re-register.
    pub fn register_consumer(
        &self,
        deployment: &str,
        spec: &ConsumerSpec,
        ordinal: u32,
        now: u64,
    ) -> StateResult<LinkKey> {
        let mut record = ConsumerRecord::from_spec(deployment, spec, ordinal, now);
        let key = record.key.to_string();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(CONSUMERS).map_err(map_err!(Table))?;
            if let Some(guard) = table.get(key.as_str()).map_err(map_err!(Read))? {
                let existing: ConsumerRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Decode))?;
                record.created_at = existing.created_at;
            }
            let value = serde_json::to_vec(&record).map_err(map_err!(Encode))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(consumer = %key, ordinal, "consumer registered");
        Ok(record.key)
    }

    /// Get a consumer by its composite key.
    pub fn get_consumer(&self, key: &LinkKey) -> StateResult<Option<ConsumerRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CONSUMERS).map_err(map_err!(Table))?;
        match table.get(key.to_string().as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: ConsumerRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Decode))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Consumers of a deployment in declaration order.
    pub fn list_consumers_for_deployment(
        &self,
        deployment: &str,
    ) -> StateResult<Vec<ConsumerRecord>> {
        let prefix = deployment_prefix(deployment);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CONSUMERS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                let record: ConsumerRecord =
                    serde_json::from_slice(value.value()).map_err(map_err!(Decode))?;
                results.push(record);
            }
        }
        results.sort_by_key(|c| c.ordinal);
        Ok(results)
    }

    /// Delete consumers of `deployment` absent from `current`,
    /// together with their links (a removed consumer's binding cannot
    /// outlive it). One write transaction; returns the number removed.
    pub fn retire_missing_consumers(
        &self,
        deployment: &str,
        current: &[LinkKey],
    ) -> StateResult<u32> {
        let keep: HashSet<String> = current.iter().map(|k| k.to_string()).collect();
        let prefix = deployment_prefix(deployment);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut removed = 0;
        {
            let mut consumers = txn.open_table(CONSUMERS).map_err(map_err!(Table))?;
            let doomed: Vec<String> = collect_keys_with_prefix(&consumers, &prefix)?
                .into_iter()
                .filter(|key| !keep.contains(key))
                .collect();
            let mut links = txn.open_table(LINKS).map_err(map_err!(Table))?;
            for key in doomed {
                consumers.remove(key.as_str()).map_err(map_err!(Write))?;
                links.remove(key.as_str()).map_err(map_err!(Write))?;
                removed += 1;
                debug!(consumer = %key, "consumer retired");
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(removed)
    }

    // ── Links ──────────────────────────────────────────────────────

    /// Get the resolved link for a consumer.
    pub fn get_link(&self, consumer: &LinkKey) -> StateResult<Option<LinkRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(LINKS).map_err(map_err!(Table))?;
        match table
            .get(consumer.to_string().as_str())
            .map_err(map_err!(Read))?
        {
            Some(guard) => {
                let record: LinkRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Decode))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Links whose consumer belongs to a deployment.
    pub fn list_links_for_deployment(&self, deployment: &str) -> StateResult<Vec<LinkRecord>> {
        let prefix = deployment_prefix(deployment);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(LINKS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                let record: LinkRecord =
                    serde_json::from_slice(value.value()).map_err(map_err!(Decode))?;
                results.push(record);
            }
        }
        Ok(results)
    }

    /// Insert a link only if its consumer has none yet. Returns true
    /// if the row was inserted. Used by the legacy content backfill,
    /// which must never clobber a resolution result.
    pub fn put_link_if_absent(&self, link: &LinkRecord) -> StateResult<bool> {
        let key = link.consumer.to_string();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let inserted;
        {
            let mut table = txn.open_table(LINKS).map_err(map_err!(Table))?;
            if table.get(key.as_str()).map_err(map_err!(Read))?.is_some() {
                inserted = false;
            } else {
                let value = serde_json::to_vec(link).map_err(map_err!(Encode))?;
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
                inserted = true;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(inserted)
    }

    /// Commit a deployment's resolved links all-or-nothing.
    ///
    /// One write transaction for the whole set. A link whose binding
    /// is unchanged is left untouched; a changed binding replaces the
    /// prior row in place, preserving `created_at`.
    pub fn commit_links(&self, deployment: &str, links: &[LinkRecord]) -> StateResult<CommitStats> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut stats = CommitStats::default();
        {
            let mut table = txn.open_table(LINKS).map_err(map_err!(Table))?;
            for link in links {
                let key = link.consumer.to_string();
                let existing: Option<LinkRecord> =
                    match table.get(key.as_str()).map_err(map_err!(Read))? {
                        Some(guard) => Some(
                            serde_json::from_slice(guard.value()).map_err(map_err!(Decode))?,
                        ),
                        None => None,
                    };
                match existing {
                    Some(prior) if prior.same_binding(link) => {
                        stats.unchanged += 1;
                        continue;
                    }
                    Some(prior) => {
                        let mut replacement = link.clone();
                        replacement.created_at = prior.created_at;
                        let value =
                            serde_json::to_vec(&replacement).map_err(map_err!(Encode))?;
                        table
                            .insert(key.as_str(), value.as_slice())
                            .map_err(map_err!(Write))?;
                        stats.updated += 1;
                    }
                    None => {
                        let value = serde_json::to_vec(link).map_err(map_err!(Encode))?;
                        table
                            .insert(key.as_str(), value.as_slice())
                            .map_err(map_err!(Write))?;
                        stats.created += 1;
                    }
                }
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(
            deployment,
            created = stats.created,
            updated = stats.updated,
            unchanged = stats.unchanged,
            "links committed"
        );
        Ok(stats)
    }
}

/// Collect every key in `table` starting with `prefix`.
fn collect_keys_with_prefix<T: ReadableTable<&'static str, &'static [u8]>>(
    table: &T,
    prefix: &str,
) -> StateResult<Vec<String>> {
    let mut keys = Vec::new();
    for entry in table.iter().map_err(map_err!(Read))? {
        let (key, _) = entry.map_err(map_err!(Read))?;
        if key.value().starts_with(prefix) {
            keys.push(key.value().to_string());
        }
    }
    Ok(keys)
}
