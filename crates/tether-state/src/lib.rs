//! tether-state — embedded registry store for the Tether link engine.
//!
//! Backed by [redb](https://docs.rs/redb), persists deployments, link
//! providers, link consumers, and resolved links.
//!
//! # Architecture
//!
//! All rows are JSON-serialized into redb's `&[u8]` value columns,
//! keyed by the dot-joined composite link key (which embeds the
//! deployment name, so per-deployment queries are prefix scans).
//!
//! redb's MVCC gives the two guarantees resolution needs: a read
//! transaction ([`RegistrySnapshot`]) observes a consistent view of
//! every deployment's registrations, and a single write transaction
//! commits a deployment's resolved links all-or-nothing.
//!
//! The `LinkStore` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and can be shared across async tasks.

pub mod error;
pub mod snapshot;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use snapshot::RegistrySnapshot;
pub use store::{CommitStats, LinkStore, ProviderScope};
pub use types::*;
