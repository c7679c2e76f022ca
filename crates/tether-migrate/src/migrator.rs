//! The backfill itself.
//!
//! Three steps, each idempotent and each skippable independently:
//! providers, consumers, and the per-instance resolved content. Every
//! row is inserted only if absent, so the batch can crash at any
//! point and be rerun without producing duplicates. Nothing here
//! assumes atomicity across the whole backfill.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use tether_state::{LinkRecord, LinkStore, StateError};

use crate::legacy::{
    LegacyDeploymentExport, LegacyInstanceExport, decode_consumer_entries, decode_provider_entries,
};

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Errors that abort the backfill. Malformed legacy entries never do;
/// they are skipped and counted instead.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("state store error: {0}")]
    State(#[from] StateError),
}

/// Per-step outcome counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepCounts {
    /// Rows written by this run.
    pub migrated: u32,
    /// Rows already present (earlier run, or key collision in the
    /// legacy data; first occurrence wins).
    pub existing: u32,
    /// Malformed legacy nodes dropped during decode.
    pub skipped: u32,
}

/// Aggregated outcome of a full backfill run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationSummary {
    pub providers: StepCounts,
    pub consumers: StepCounts,
    pub links: StepCounts,
}

/// One-time backfill from the legacy embedded format.
pub struct Migrator {
    store: LinkStore,
}

impl Migrator {
    pub fn new(store: LinkStore) -> Self {
        Self { store }
    }

    /// Run the whole backfill. `include_resolved` additionally
    /// backfills each instance's resolved link content into link
    /// rows, retiring the legacy embedded form as a read source.
    pub fn run(
        &self,
        deployments: &[LegacyDeploymentExport],
        instances: &[LegacyInstanceExport],
        include_resolved: bool,
        now: u64,
    ) -> MigrateResult<MigrationSummary> {
        let mut summary = MigrationSummary {
            providers: self.migrate_providers(deployments, now)?,
            consumers: self.migrate_consumers(instances, now)?,
            ..MigrationSummary::default()
        };
        if include_resolved {
            summary.links = self.migrate_resolved_content(instances, now)?;
        }
        info!(?summary, "legacy link backfill finished");
        Ok(summary)
    }

    /// Backfill provider rows from deployments' embedded link specs.
    pub fn migrate_providers(
        &self,
        deployments: &[LegacyDeploymentExport],
        now: u64,
    ) -> MigrateResult<StepCounts> {
        let mut counts = StepCounts::default();
        for export in deployments {
            self.store.ensure_deployment(&export.name, now)?;
            let (entries, skipped) = decode_provider_entries(export);
            counts.skipped += skipped;
            for entry in entries {
                if self.store.find_provider_by_key(&entry.key())?.is_some() {
                    counts.existing += 1;
                    debug!(provider = %entry.key(), "already migrated");
                    continue;
                }
                self.store
                    .register_provider(&export.name, &entry.to_spec(), now)?;
                counts.migrated += 1;
            }
        }
        info!(
            migrated = counts.migrated,
            existing = counts.existing,
            skipped = counts.skipped,
            "provider backfill step done"
        );
        Ok(counts)
    }

    /// Backfill consumer rows from instances' embedded link maps.
    ///
    /// The same logical consumer key recurs across many instance rows
    /// of one instance group; only the first occurrence inserts.
    pub fn migrate_consumers(
        &self,
        instances: &[LegacyInstanceExport],
        now: u64,
    ) -> MigrateResult<StepCounts> {
        let mut counts = StepCounts::default();
        for export in instances {
            self.store.ensure_deployment(&export.deployment, now)?;
            let (entries, skipped) = decode_consumer_entries(export);
            counts.skipped += skipped;
            for entry in entries {
                if self.store.get_consumer(&entry.key())?.is_some() {
                    counts.existing += 1;
                    continue;
                }
                let ordinal = self
                    .store
                    .list_consumers_for_deployment(&export.deployment)?
                    .len() as u32;
                self.store
                    .register_consumer(&export.deployment, &entry.to_spec(), ordinal, now)?;
                counts.migrated += 1;
            }
        }
        info!(
            migrated = counts.migrated,
            existing = counts.existing,
            skipped = counts.skipped,
            "consumer backfill step done"
        );
        Ok(counts)
    }

    /// Backfill each instance's resolved link content into link rows
    /// (no provider reference, same shape as manual links).
    ///
    /// Never overwrites an existing link: output of a real resolution
    /// pass always wins over historical content.
    pub fn migrate_resolved_content(
        &self,
        instances: &[LegacyInstanceExport],
        now: u64,
    ) -> MigrateResult<StepCounts> {
        let mut counts = StepCounts::default();
        for export in instances {
            let (entries, skipped) = decode_consumer_entries(export);
            counts.skipped += skipped;
            for entry in entries {
                let link = LinkRecord {
                    consumer: entry.key(),
                    provider: None,
                    content_snapshot: entry.content.clone(),
                    created_at: now,
                    updated_at: now,
                };
                if self.store.put_link_if_absent(&link)? {
                    counts.migrated += 1;
                } else {
                    counts.existing += 1;
                }
            }
        }
        info!(
            migrated = counts.migrated,
            existing = counts.existing,
            skipped = counts.skipped,
            "resolved content backfill step done"
        );
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tether_core::LinkKey;
    use tether_state::ProviderScope;

    fn deployment_export() -> LegacyDeploymentExport {
        LegacyDeploymentExport {
            name: "d1".to_string(),
            link_spec: json!({
                "ig": {
                    "mysql": {
                        "db": {"mysql": {"address": "10.0.0.5"}}
                    },
                    "redis": {
                        "cache": {"redis": {"address": "10.0.0.6"}}
                    }
                }
            }),
        }
    }

    fn instance_exports() -> Vec<LegacyInstanceExport> {
        // Two instances of the same group declare the same consumer
        // key; a third belongs to another group.
        let links = json!({
            "app": {"db": {"address": "10.0.0.5"}}
        });
        vec![
            LegacyInstanceExport {
                deployment: "d2".to_string(),
                instance_group: "web".to_string(),
                links: links.clone(),
            },
            LegacyInstanceExport {
                deployment: "d2".to_string(),
                instance_group: "web".to_string(),
                links,
            },
            LegacyInstanceExport {
                deployment: "d2".to_string(),
                instance_group: "worker".to_string(),
                links: json!({
                    "job-runner": {"db": {"address": "10.0.0.5"}}
                }),
            },
        ]
    }

    #[test]
    fn providers_become_shared_consumable_rows() {
        let store = LinkStore::open_in_memory().unwrap();
        let migrator = Migrator::new(store.clone());

        let counts = migrator
            .migrate_providers(&[deployment_export()], 100)
            .unwrap();
        assert_eq!(counts.migrated, 2);

        let rows = store.list_providers_for_deployment("d1").unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|p| p.shared && p.consumable));
        assert!(store.get_deployment("d1").unwrap().is_some());

        // Migrated providers are immediately matchable from anywhere.
        let visible = store
            .find_providers_by_definition(
                &tether_core::LinkDefinition::new("mysql", "db"),
                ProviderScope::VisibleTo("elsewhere"),
            )
            .unwrap();
        assert_eq!(visible.len(), 1);
    }

    #[test]
    fn duplicate_consumer_keys_across_instances_insert_once() {
        let store = LinkStore::open_in_memory().unwrap();
        let migrator = Migrator::new(store.clone());

        let counts = migrator.migrate_consumers(&instance_exports(), 100).unwrap();
        assert_eq!(counts.migrated, 2);
        assert_eq!(counts.existing, 1);

        let consumers = store.list_consumers_for_deployment("d2").unwrap();
        assert_eq!(consumers.len(), 2);
        assert_eq!(consumers[0].key.to_string(), "d2.web.app.db");
        assert_eq!(consumers[1].key.to_string(), "d2.worker.job-runner.db");
    }

    #[test]
    fn rerunning_the_backfill_changes_nothing() {
        let store = LinkStore::open_in_memory().unwrap();
        let migrator = Migrator::new(store.clone());
        let deployments = [deployment_export()];
        let instances = instance_exports();

        migrator.run(&deployments, &instances, true, 100).unwrap();
        let providers_before = store.list_providers_for_deployment("d1").unwrap();
        let consumers_before = store.list_consumers_for_deployment("d2").unwrap();
        let links_before = store.list_links_for_deployment("d2").unwrap();

        let second = migrator.run(&deployments, &instances, true, 200).unwrap();
        assert_eq!(second.providers.migrated, 0);
        assert_eq!(second.consumers.migrated, 0);
        assert_eq!(second.links.migrated, 0);

        assert_eq!(store.list_providers_for_deployment("d1").unwrap(), providers_before);
        assert_eq!(store.list_consumers_for_deployment("d2").unwrap(), consumers_before);
        assert_eq!(store.list_links_for_deployment("d2").unwrap(), links_before);
    }

    #[test]
    fn deleting_one_row_and_rerunning_recreates_only_it() {
        let store = LinkStore::open_in_memory().unwrap();
        let migrator = Migrator::new(store.clone());
        let instances = instance_exports();
        migrator.migrate_consumers(&instances, 100).unwrap();

        // Drop one migrated consumer, keep the other.
        let dropped = LinkKey::new("d2", "web", "app", "db");
        store
            .retire_missing_consumers(
                "d2",
                &[LinkKey::new("d2", "worker", "job-runner", "db")],
            )
            .unwrap();
        assert!(store.get_consumer(&dropped).unwrap().is_none());

        let counts = migrator.migrate_consumers(&instances, 200).unwrap();
        assert_eq!(counts.migrated, 1);
        assert_eq!(store.list_consumers_for_deployment("d2").unwrap().len(), 2);
        assert!(store.get_consumer(&dropped).unwrap().is_some());
    }

    #[test]
    fn resolved_content_backfill_never_clobbers_links() {
        let store = LinkStore::open_in_memory().unwrap();
        let migrator = Migrator::new(store.clone());
        let instances = instance_exports();

        // A real resolution already produced a link for one consumer.
        let resolved = LinkRecord {
            consumer: LinkKey::new("d2", "web", "app", "db"),
            provider: Some(LinkKey::new("d1", "ig", "mysql", "db")),
            content_snapshot: [("address".to_string(), serde_json::Value::from("10.9.9.9"))]
                .into_iter()
                .collect(),
            created_at: 50,
            updated_at: 50,
        };
        store.commit_links("d2", std::slice::from_ref(&resolved)).unwrap();

        let counts = migrator.migrate_resolved_content(&instances, 100).unwrap();
        assert_eq!(counts.migrated, 1);
        assert_eq!(counts.existing, 2);

        let kept = store.get_link(&resolved.consumer).unwrap().unwrap();
        assert_eq!(kept.content_snapshot["address"], "10.9.9.9");
        assert!(kept.provider.is_some());

        let backfilled = store
            .get_link(&LinkKey::new("d2", "worker", "job-runner", "db"))
            .unwrap()
            .unwrap();
        assert!(backfilled.provider.is_none());
        assert_eq!(backfilled.content_snapshot["address"], "10.0.0.5");
    }

    #[test]
    fn malformed_entries_skip_without_aborting() {
        let store = LinkStore::open_in_memory().unwrap();
        let migrator = Migrator::new(store.clone());

        let export = LegacyDeploymentExport {
            name: "d1".to_string(),
            link_spec: json!({
                "ig": {
                    "mysql": {"db": {"mysql": {"address": "10.0.0.5"}}},
                    "broken": "nope"
                }
            }),
        };

        let counts = migrator.migrate_providers(&[export], 100).unwrap();
        assert_eq!(counts.migrated, 1);
        assert_eq!(counts.skipped, 1);
        assert_eq!(store.list_providers_for_deployment("d1").unwrap().len(), 1);
    }
}
