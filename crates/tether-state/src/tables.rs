//! redb table definitions for the Tether registry store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized
//! rows). Provider, consumer, and link keys are the dot-joined
//! composite form `{deployment}.{instance_group}.{job}.{link_name}`,
//! so every per-deployment query is a `{deployment}.` prefix scan.

use redb::TableDefinition;

/// Deployment rows keyed by deployment name.
pub const DEPLOYMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("deployments");

/// Provider rows keyed by composite provider key.
pub const PROVIDERS: TableDefinition<&str, &[u8]> = TableDefinition::new("link_providers");

/// Consumer rows keyed by composite consumer key.
pub const CONSUMERS: TableDefinition<&str, &[u8]> = TableDefinition::new("link_consumers");

/// Resolved link rows keyed by their consumer's composite key.
pub const LINKS: TableDefinition<&str, &[u8]> = TableDefinition::new("links");
