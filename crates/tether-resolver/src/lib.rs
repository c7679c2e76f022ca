//! Tether link resolution — matching consumers to providers.
//!
//! The resolution pass is a pure function of a provider catalog
//! snapshot and a deployment's declaration-ordered consumer set. It
//! performs no I/O beyond catalog reads and issues no remote calls,
//! which is what makes it fully unit-testable offline.
//!
//! Each consumer is evaluated independently; failures are collected
//! across the whole set rather than short-circuiting, so one failed
//! deploy reports every broken link. The pass either yields a link
//! for every consumer or a non-empty diagnostic report, never a
//! partial result.
//!
//! # Components
//!
//! - **`catalog`** — the injected provider view (store snapshot or
//!   in-memory, for offline evaluation)
//! - **`resolve`** — the matching pass itself
//! - **`diagnostics`** — structured per-consumer failures and the
//!   aggregated deployment report
//! - **`binder`** — resolved content exposure for template rendering

pub mod binder;
pub mod catalog;
pub mod diagnostics;
pub mod resolve;

pub use binder::template_content;
pub use catalog::{ProviderCatalog, StaticCatalog};
pub use diagnostics::{FailureKind, ResolutionFailure, ResolutionReport};
pub use resolve::{PassOutcome, resolve_deployment};
