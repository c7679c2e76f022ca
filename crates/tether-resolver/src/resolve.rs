//! The resolution pass.
//!
//! For each consumer, build the candidate provider set, apply the
//! visibility rules, and bind to exactly one provider or record a
//! failure. Consumers are independent of each other; the pass
//! evaluates all of them and only then decides success or failure.

use tracing::{debug, warn};

use tether_core::{LinkContent, LinkKey, Requirement};
use tether_state::{ConsumerRecord, LinkRecord, ProviderRecord, StateResult};

use crate::catalog::ProviderCatalog;
use crate::diagnostics::{FailureKind, ResolutionReport};

/// Override keys accepted even when the provider's content does not
/// already carry them: a consumer may narrow or complete connection
/// coordinates, but cannot invent arbitrary properties.
pub const STANDARD_CONNECTION_KEYS: &[&str] = &["address", "addresses", "port"];

/// Result of a whole-deployment resolution pass.
#[derive(Debug)]
pub enum PassOutcome {
    /// One link per consumer, in declaration order.
    Resolved(Vec<LinkRecord>),
    /// At least one consumer failed; nothing may be committed.
    Failed(ResolutionReport),
}

/// Run the resolution pass for one deployment.
///
/// `consumers` must be the deployment's full consumer set in
/// declaration order. The catalog is a consistent snapshot; the pass
/// itself never writes.
pub fn resolve_deployment<C: ProviderCatalog>(
    catalog: &C,
    deployment: &str,
    consumers: &[ConsumerRecord],
    now: u64,
) -> StateResult<PassOutcome> {
    let mut links = Vec::with_capacity(consumers.len());
    let mut report = ResolutionReport::new(deployment);
    report.consumers_evaluated = consumers.len();

    for consumer in consumers {
        match resolve_consumer(catalog, deployment, consumer)? {
            Ok(binding) => {
                debug!(
                    consumer = %consumer.key,
                    provider = binding
                        .provider
                        .as_ref()
                        .map(|k| k.to_string())
                        .unwrap_or_default(),
                    "link bound"
                );
                links.push(LinkRecord {
                    consumer: consumer.key.clone(),
                    provider: binding.provider,
                    content_snapshot: binding.content,
                    created_at: now,
                    updated_at: now,
                });
            }
            Err(kind) => {
                warn!(
                    consumer = %consumer.key,
                    failure = kind.label(),
                    "link resolution failed"
                );
                report.push(consumer.key.clone(), consumer.owner.clone(), kind);
            }
        }
    }

    if report.is_empty() {
        Ok(PassOutcome::Resolved(links))
    } else {
        Ok(PassOutcome::Failed(report))
    }
}

/// A successful per-consumer outcome: the provider bound (None for
/// manual links) and the materialized content.
struct Binding {
    provider: Option<LinkKey>,
    content: LinkContent,
}

/// Resolve one consumer to a binding, or a failure.
fn resolve_consumer<C: ProviderCatalog>(
    catalog: &C,
    deployment: &str,
    consumer: &ConsumerRecord,
) -> StateResult<Result<Binding, FailureKind>> {
    let outcome = match &consumer.requirement {
        // Manual links bypass matching entirely but still produce a
        // binding, so downstream readers never special-case them.
        Requirement::Manual { content } => Ok(Binding {
            provider: None,
            content: content.clone(),
        }),

        Requirement::Pinned {
            provider,
            definition,
            overrides,
        } => match catalog.provider_by_key(provider)? {
            Some(p) if visible_to(&p, deployment) => {
                if p.definition == *definition {
                    apply_overrides(&p, overrides).map(|content| Binding {
                        provider: Some(p.key.clone()),
                        content,
                    })
                } else {
                    Err(FailureKind::IncompatibleProvider {
                        provider: p.key.clone(),
                        expected: definition.clone(),
                        found: p.definition.clone(),
                    })
                }
            }
            // Absent and present-but-invisible look the same to the
            // consumer: the pinned identity cannot be bound.
            _ => Err(FailureKind::MissingProvider {
                definition: definition.clone(),
            }),
        },

        Requirement::Implicit {
            definition,
            overrides,
        } => {
            let matching = catalog.providers_by_definition(definition)?;
            let (visible, withheld): (Vec<_>, Vec<_>) = matching
                .into_iter()
                .filter(|p| p.consumable)
                .partition(|p| visible_to(p, deployment));

            match visible.as_slice() {
                [single] => apply_overrides(single, overrides).map(|content| Binding {
                    provider: Some(single.key.clone()),
                    content,
                }),
                [] if withheld.is_empty() => Err(FailureKind::MissingProvider {
                    definition: definition.clone(),
                }),
                [] => Err(FailureKind::CrossDeploymentNotShared {
                    definition: definition.clone(),
                    withheld: sorted_keys(&withheld),
                }),
                _ => Err(FailureKind::AmbiguousProvider {
                    definition: definition.clone(),
                    candidates: sorted_keys(&visible),
                }),
            }
        }
    };
    Ok(outcome)
}

/// A provider is visible to consumers in `deployment` when it is
/// eligible for new bindings and either local or shared.
fn visible_to(provider: &ProviderRecord, deployment: &str) -> bool {
    provider.consumable && (provider.deployment() == deployment || provider.shared)
}

/// Provider content with consumer overrides applied key-by-key,
/// consumer value winning.
fn apply_overrides(
    provider: &ProviderRecord,
    overrides: &LinkContent,
) -> Result<LinkContent, FailureKind> {
    let mut content = provider.content.clone();
    for (key, value) in overrides {
        if !content.contains_key(key) && !STANDARD_CONNECTION_KEYS.contains(&key.as_str()) {
            return Err(FailureKind::UnknownPropertyOverride {
                provider: provider.key.clone(),
                property: key.clone(),
            });
        }
        content.insert(key.clone(), value.clone());
    }
    Ok(content)
}

/// Candidate identities sorted by (deployment name, provider key).
fn sorted_keys(providers: &[ProviderRecord]) -> Vec<LinkKey> {
    let mut keys: Vec<LinkKey> = providers.iter().map(|p| p.key.clone()).collect();
    keys.sort_by(|a, b| {
        (a.deployment.as_str(), a.to_string()).cmp(&(b.deployment.as_str(), b.to_string()))
    });
    keys
}
