use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;

use tether_migrate::{LegacyDeploymentExport, LegacyInstanceExport, Migrator};
use tether_state::LinkStore;

/// Export file shape: the old schema's embedded link data, dumped as
/// one JSON document.
#[derive(Deserialize)]
struct MigrationFile {
    #[serde(default)]
    deployments: Vec<LegacyDeploymentExport>,
    #[serde(default)]
    instances: Vec<LegacyInstanceExport>,
}

pub fn run(store: &LinkStore, file: &Path, include_resolved: bool) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)?;
    let export: MigrationFile = serde_json::from_str(&content)?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let migrator = Migrator::new(store.clone());
    let summary = migrator.run(&export.deployments, &export.instances, include_resolved, now)?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
