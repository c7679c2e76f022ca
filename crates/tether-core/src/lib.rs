//! tether-core — shared types for the Tether link engine.
//!
//! Tether binds jobs that publish data (providers) to jobs that declare
//! a requirement for it (consumers), one provider per consumer, at
//! deploy time. This crate holds the vocabulary every other crate
//! speaks: composite link identities, owner references, link content,
//! requirement specs, and the `tether.toml` configuration.
//!
//! No I/O lives here except config file loading.

pub mod config;
pub mod keys;
pub mod owner;
pub mod types;

pub use config::TetherConfig;
pub use keys::{KeyError, LinkKey};
pub use owner::OwnerRef;
pub use types::{ConsumerSpec, LinkContent, LinkDefinition, ProviderSpec, Requirement};
