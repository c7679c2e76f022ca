//! tether-migrate — backfill from the legacy embedded link format.
//!
//! Older releases kept link data embedded in deployment and instance
//! records as nested maps. This crate performs the one-time backfill
//! into the normalized registries. It runs as an offline batch during
//! a schema upgrade, tolerates being interrupted and restarted (every
//! insert is idempotent), and skips malformed legacy entries with a
//! log line instead of aborting: historical data may already be
//! inconsistent and must not block a working deployment.
//!
//! The untyped nested maps are decoded into typed records (`legacy`)
//! before anything touches the store (`migrator`), keeping format
//! fragility away from the registries.

pub mod legacy;
pub mod migrator;

pub use legacy::{
    LegacyConsumerEntry, LegacyDeploymentExport, LegacyInstanceExport, LegacyProviderEntry,
    decode_consumer_entries, decode_provider_entries,
};
pub use migrator::{MigrateError, MigrateResult, MigrationSummary, Migrator, StepCounts};
