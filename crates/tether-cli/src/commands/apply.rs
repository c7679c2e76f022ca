use std::path::Path;

use serde::Deserialize;

use tether_core::{ConsumerSpec, ProviderSpec};
use tether_deploy::{DeployError, DeployRunner};
use tether_state::LinkStore;

/// Spec file shape: the manifest parser's declaration-ordered output.
#[derive(Deserialize)]
struct ApplyFile {
    #[serde(default)]
    providers: Vec<ProviderSpec>,
    #[serde(default)]
    consumers: Vec<ConsumerSpec>,
}

pub async fn run(store: &LinkStore, deployment: &str, file: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)?;
    let spec: ApplyFile = serde_json::from_str(&content)?;

    let runner = DeployRunner::new(store.clone());
    match runner.apply(deployment, &spec.providers, &spec.consumers).await {
        Ok(summary) => {
            println!(
                "✓ applied '{}': {} providers, {} consumers, links +{} ~{} ={}",
                summary.deployment,
                summary.providers_registered,
                summary.consumers_registered,
                summary.links.created,
                summary.links.updated,
                summary.links.unchanged,
            );
            Ok(())
        }
        Err(DeployError::ResolutionFailed(report)) => {
            // The full per-consumer report, then a hard failure: the
            // deploy must abort before any instance or template change.
            eprint!("{report}");
            anyhow::bail!("apply aborted for deployment '{deployment}'")
        }
        Err(err) => Err(err.into()),
    }
}
