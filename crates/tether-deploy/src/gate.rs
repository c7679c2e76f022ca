//! Per-deployment apply serialization.
//!
//! Applies for one deployment name take turns; applies for different
//! deployments proceed concurrently. Lock entries are small and kept
//! for the process lifetime, matching the request-scoped work model
//! (no background tasks to clean them up).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Scoped lock registry keyed by deployment name.
#[derive(Clone, Default)]
pub struct DeployGate {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl DeployGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for one deployment, waiting behind any apply
    /// already running for it.
    pub async fn acquire(&self, deployment: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(deployment.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
