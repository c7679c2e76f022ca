//! Deploy apply error types.

use thiserror::Error;

use tether_core::LinkKey;
use tether_resolver::ResolutionReport;
use tether_state::StateError;

/// Result type alias for deploy apply operations.
pub type DeployResult<T> = Result<T, DeployError>;

/// Errors that abort a deploy apply.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Two providers in one submitted spec set share a key. A
    /// manifest-authoring error; rejected before anything is written.
    #[error("duplicate provider key in deployment spec set: {0}")]
    DuplicateProviderKey(LinkKey),

    /// Two consumers in one submitted spec set share a key.
    #[error("duplicate consumer key in deployment spec set: {0}")]
    DuplicateConsumerKey(LinkKey),

    /// The resolution pass failed; carries the full per-consumer
    /// report for the deployment.
    #[error("{0}")]
    ResolutionFailed(ResolutionReport),

    #[error("state store error: {0}")]
    State(#[from] StateError),
}
