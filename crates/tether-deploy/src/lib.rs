//! tether-deploy — the per-deploy apply around link resolution.
//!
//! An apply takes the current manifest's provider and consumer specs
//! for one deployment and drives them through the engine:
//! registration sweep (upserts, deactivation of vanished providers,
//! retirement of vanished consumers), a resolution pass over a
//! consistent registry snapshot, and an all-or-nothing link commit.
//!
//! Applies for the same deployment serialize on a scoped lock;
//! applies for different deployments run concurrently. A failed
//! resolution pass aborts the apply with the full aggregated report
//! before any link row changes.

pub mod apply;
pub mod error;
pub mod gate;

pub use apply::{ApplySummary, DeployRunner};
pub use error::{DeployError, DeployResult};
pub use gate::DeployGate;
