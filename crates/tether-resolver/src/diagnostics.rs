//! Structured resolution diagnostics.
//!
//! One record per failed consumer, aggregated into a per-deployment
//! report whose rendering is deterministic: consumers appear in
//! declaration order and candidate lists are sorted by
//! (deployment name, provider key).

use std::fmt;

use serde::{Deserialize, Serialize};

use tether_core::{LinkDefinition, LinkKey, OwnerRef};

/// Why one consumer could not be bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// No visible provider matches the requirement.
    MissingProvider { definition: LinkDefinition },
    /// More than one visible provider matches.
    AmbiguousProvider {
        definition: LinkDefinition,
        candidates: Vec<LinkKey>,
    },
    /// A pinned provider exists but offers a different definition.
    IncompatibleProvider {
        provider: LinkKey,
        expected: LinkDefinition,
        found: LinkDefinition,
    },
    /// An override names a property the provider does not publish.
    UnknownPropertyOverride { provider: LinkKey, property: String },
    /// Matching providers exist in other deployments but are not shared.
    CrossDeploymentNotShared {
        definition: LinkDefinition,
        withheld: Vec<LinkKey>,
    },
}

impl FailureKind {
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::MissingProvider { .. } => "missing provider",
            FailureKind::AmbiguousProvider { .. } => "ambiguous provider",
            FailureKind::IncompatibleProvider { .. } => "incompatible provider",
            FailureKind::UnknownPropertyOverride { .. } => "unknown property override",
            FailureKind::CrossDeploymentNotShared { .. } => "provider not shared",
        }
    }

    fn describe(&self) -> String {
        match self {
            FailureKind::MissingProvider { definition } => {
                format!("no consumable provider matches {definition}")
            }
            FailureKind::AmbiguousProvider {
                definition,
                candidates,
            } => format!(
                "{} providers match {definition}: {}",
                candidates.len(),
                join_keys(candidates)
            ),
            FailureKind::IncompatibleProvider {
                provider,
                expected,
                found,
            } => format!("pinned provider {provider} offers {found}, requirement is {expected}"),
            FailureKind::UnknownPropertyOverride { provider, property } => {
                format!("override property '{property}' does not exist in content of {provider}")
            }
            FailureKind::CrossDeploymentNotShared {
                definition,
                withheld,
            } => format!(
                "providers matching {definition} exist but are not shared: {}",
                join_keys(withheld)
            ),
        }
    }
}

fn join_keys(keys: &[LinkKey]) -> String {
    keys.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One failed consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionFailure {
    pub consumer: LinkKey,
    pub owner: OwnerRef,
    pub kind: FailureKind,
}

/// Aggregated outcome of a failed resolution pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub deployment: String,
    /// Number of consumers the pass evaluated (failed or not).
    pub consumers_evaluated: usize,
    /// Failures in consumer declaration order.
    pub failures: Vec<ResolutionFailure>,
}

impl ResolutionReport {
    pub fn new(deployment: &str) -> Self {
        Self {
            deployment: deployment.to_string(),
            consumers_evaluated: 0,
            failures: Vec::new(),
        }
    }

    pub fn push(&mut self, consumer: LinkKey, owner: OwnerRef, kind: FailureKind) {
        self.failures.push(ResolutionFailure {
            consumer,
            owner,
            kind,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for ResolutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "link resolution failed for deployment '{}': {} of {} consumers unresolved",
            self.deployment,
            self.failures.len(),
            self.consumers_evaluated
        )?;
        for failure in &self.failures {
            writeln!(
                f,
                "  {} ({}): {}",
                failure.consumer,
                failure.owner.describe(),
                failure.kind.describe()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_renders_one_line_per_failure() {
        let mut report = ResolutionReport::new("d2");
        report.consumers_evaluated = 3;
        report.push(
            LinkKey::new("d2", "web", "app", "db"),
            OwnerRef::job("app", "web"),
            FailureKind::MissingProvider {
                definition: LinkDefinition::new("mysql", "db"),
            },
        );
        report.push(
            LinkKey::new("d2", "web", "app", "cache"),
            OwnerRef::job("app", "web"),
            FailureKind::AmbiguousProvider {
                definition: LinkDefinition::new("redis", "cache"),
                candidates: vec![
                    LinkKey::new("d1", "db", "redis", "cache"),
                    LinkKey::new("d3", "db", "redis", "cache"),
                ],
            },
        );

        let rendered = report.to_string();
        assert!(rendered.contains("2 of 3 consumers unresolved"));
        assert!(rendered.contains("d2.web.app.db (job 'app' in instance group 'web')"));
        assert!(rendered.contains("no consumable provider matches type 'mysql' name 'db'"));
        assert!(rendered.contains("d1.db.redis.cache, d3.db.redis.cache"));
    }

    #[test]
    fn kinds_have_stable_labels() {
        let kind = FailureKind::UnknownPropertyOverride {
            provider: LinkKey::new("d1", "db", "mysql", "conn"),
            property: "bogus".to_string(),
        };
        assert_eq!(kind.label(), "unknown property override");
        assert!(kind.describe().contains("'bogus'"));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let kind = FailureKind::MissingProvider {
            definition: LinkDefinition::new("mysql", "db"),
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["kind"], "missing_provider");
        assert_eq!(json["definition"]["type"], "mysql");
    }
}
