//! DeployRunner — drives one deployment's specs through the engine.
//!
//! Registration reflects the current manifest (stale providers are
//! deactivated, vanished consumers retired with their links), then a
//! resolution pass runs over a consistent snapshot and its output is
//! committed in a single transaction. Between registration and commit
//! nothing mutates link rows, so a cancelled or failed apply never
//! leaves a partially-resolved link set behind.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{info, warn};

use tether_core::{ConsumerSpec, LinkKey, ProviderSpec};
use tether_resolver::{PassOutcome, resolve_deployment};
use tether_state::{CommitStats, LinkStore};

use crate::error::{DeployError, DeployResult};
use crate::gate::DeployGate;

/// Outcome of a successful apply.
#[derive(Debug, Clone, Serialize)]
pub struct ApplySummary {
    pub deployment: String,
    pub providers_registered: usize,
    pub consumers_registered: usize,
    pub consumers_retired: u32,
    pub providers_deactivated: u32,
    pub links: CommitStats,
}

/// Applies deployments against one link store.
#[derive(Clone)]
pub struct DeployRunner {
    store: LinkStore,
    gate: DeployGate,
}

impl DeployRunner {
    pub fn new(store: LinkStore) -> Self {
        Self {
            store,
            gate: DeployGate::new(),
        }
    }

    pub fn store(&self) -> &LinkStore {
        &self.store
    }

    /// Apply one deployment's current provider and consumer specs.
    ///
    /// Specs must be in declaration order; consumer ordinals follow
    /// slice positions. Holds the deployment's scoped lock for the
    /// whole apply.
    pub async fn apply(
        &self,
        deployment: &str,
        providers: &[ProviderSpec],
        consumers: &[ConsumerSpec],
    ) -> DeployResult<ApplySummary> {
        let _guard = self.gate.acquire(deployment).await;
        let now = epoch_secs();

        // Duplicate keys within one submitted spec set are authoring
        // errors; reject before writing anything.
        let provider_keys = check_unique(
            providers.iter().map(|s| s.key(deployment)),
            DeployError::DuplicateProviderKey,
        )?;
        let consumer_keys = check_unique(
            consumers.iter().map(|s| s.key(deployment)),
            DeployError::DuplicateConsumerKey,
        )?;

        self.store.ensure_deployment(deployment, now)?;
        for spec in providers {
            self.store.register_provider(deployment, spec, now)?;
        }
        let deactivated = self
            .store
            .deactivate_missing_providers(deployment, &provider_keys, now)?;
        for (ordinal, spec) in consumers.iter().enumerate() {
            self.store
                .register_consumer(deployment, spec, ordinal as u32, now)?;
        }
        let retired = self
            .store
            .retire_missing_consumers(deployment, &consumer_keys)?;

        // Resolve against a consistent snapshot of every deployment's
        // registrations, then commit all-or-nothing.
        let snapshot = self.store.snapshot()?;
        let records = self.store.list_consumers_for_deployment(deployment)?;
        match resolve_deployment(&snapshot, deployment, &records, now)? {
            PassOutcome::Failed(report) => {
                warn!(
                    deployment,
                    failures = report.failures.len(),
                    "apply aborted, resolution pass failed"
                );
                Err(DeployError::ResolutionFailed(report))
            }
            PassOutcome::Resolved(links) => {
                let stats = self.store.commit_links(deployment, &links)?;
                info!(
                    deployment,
                    created = stats.created,
                    updated = stats.updated,
                    unchanged = stats.unchanged,
                    "apply finished"
                );
                Ok(ApplySummary {
                    deployment: deployment.to_string(),
                    providers_registered: providers.len(),
                    consumers_registered: consumers.len(),
                    consumers_retired: retired,
                    providers_deactivated: deactivated,
                    links: stats,
                })
            }
        }
    }
}

fn check_unique<I>(keys: I, dup: fn(LinkKey) -> DeployError) -> DeployResult<Vec<LinkKey>>
where
    I: Iterator<Item = LinkKey>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for key in keys {
        if !seen.insert(key.clone()) {
            return Err(dup(key));
        }
        out.push(key);
    }
    Ok(out)
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::{LinkContent, LinkDefinition, OwnerRef, Requirement};

    fn provider(job: &str, link: &str, kind: &str, shared: bool) -> ProviderSpec {
        ProviderSpec {
            instance_group: "db".to_string(),
            job: job.to_string(),
            link_name: link.to_string(),
            display_name: link.to_string(),
            definition: LinkDefinition::new(kind, link),
            shared,
            content: [("address".to_string(), serde_json::Value::from("10.0.0.5"))]
                .into_iter()
                .collect(),
            owner: OwnerRef::job(job, "db"),
        }
    }

    fn consumer(job: &str, link: &str, kind: &str) -> ConsumerSpec {
        ConsumerSpec {
            instance_group: "web".to_string(),
            job: job.to_string(),
            link_name: link.to_string(),
            requirement: Requirement::Implicit {
                definition: LinkDefinition::new(kind, link),
                overrides: LinkContent::new(),
            },
            owner: OwnerRef::job(job, "web"),
        }
    }

    #[tokio::test]
    async fn duplicate_provider_keys_are_rejected_before_writes() {
        let runner = DeployRunner::new(LinkStore::open_in_memory().unwrap());
        let specs = vec![
            provider("mysql", "db", "mysql", true),
            provider("mysql", "db", "postgres", true),
        ];

        let err = runner.apply("d1", &specs, &[]).await.unwrap_err();
        assert!(matches!(err, DeployError::DuplicateProviderKey(_)));
        assert!(runner
            .store()
            .list_providers_for_deployment("d1")
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn duplicate_consumer_keys_are_rejected() {
        let runner = DeployRunner::new(LinkStore::open_in_memory().unwrap());
        let specs = vec![consumer("app", "db", "mysql"), consumer("app", "db", "redis")];

        let err = runner.apply("d1", &[], &specs).await.unwrap_err();
        assert!(matches!(err, DeployError::DuplicateConsumerKey(_)));
    }

    #[tokio::test]
    async fn apply_binds_local_provider_and_consumer() {
        let runner = DeployRunner::new(LinkStore::open_in_memory().unwrap());

        let summary = runner
            .apply(
                "d1",
                &[provider("mysql", "db", "mysql", false)],
                &[consumer("app", "db", "mysql")],
            )
            .await
            .unwrap();

        assert_eq!(summary.links.created, 1);
        let link = runner
            .store()
            .get_link(&LinkKey::new("d1", "web", "app", "db"))
            .unwrap()
            .unwrap();
        assert_eq!(link.content_snapshot["address"], "10.0.0.5");
        assert_eq!(
            link.provider.as_ref().unwrap().to_string(),
            "d1.db.mysql.db"
        );
    }

    #[tokio::test]
    async fn failed_resolution_aborts_without_touching_links() {
        let runner = DeployRunner::new(LinkStore::open_in_memory().unwrap());
        runner
            .apply(
                "d1",
                &[provider("mysql", "db", "mysql", false)],
                &[consumer("app", "db", "mysql")],
            )
            .await
            .unwrap();
        let before = runner.store().list_links_for_deployment("d1").unwrap();

        // Same consumers, but the provider vanished from the manifest.
        let err = runner
            .apply("d1", &[], &[consumer("app", "db", "mysql")])
            .await
            .unwrap_err();
        match err {
            DeployError::ResolutionFailed(report) => {
                assert_eq!(report.failures.len(), 1);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Prior links exactly as they were.
        assert_eq!(runner.store().list_links_for_deployment("d1").unwrap(), before);
    }
}
