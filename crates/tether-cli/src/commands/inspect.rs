use tether_state::LinkStore;

pub fn providers(store: &LinkStore, deployment: &str) -> anyhow::Result<()> {
    let rows = store.list_providers_for_deployment(deployment)?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

pub fn consumers(store: &LinkStore, deployment: &str) -> anyhow::Result<()> {
    let rows = store.list_consumers_for_deployment(deployment)?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

pub fn links(store: &LinkStore, deployment: &str) -> anyhow::Result<()> {
    let rows = store.list_links_for_deployment(deployment)?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

pub fn delete_deployment(store: &LinkStore, deployment: &str) -> anyhow::Result<()> {
    if store.delete_deployment(deployment)? {
        println!("✓ deleted '{deployment}' and everything linked to it");
    } else {
        println!("deployment '{deployment}' not found");
    }
    Ok(())
}
