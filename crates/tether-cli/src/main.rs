use std::path::PathBuf;

use clap::{Parser, Subcommand};

use tether_core::TetherConfig;
use tether_state::LinkStore;

mod commands;

#[derive(Parser)]
#[command(
    name = "tether",
    about = "Tether — link registry and resolution engine",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to tether.toml (built-in defaults when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the store path from the config
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a deployment's declared links and resolve them.
    ///
    /// The spec file is JSON with `providers` and `consumers` arrays,
    /// in declaration order, as produced by the manifest parser.
    Apply {
        /// Deployment name
        #[arg(short, long)]
        deployment: String,
        /// Path to the JSON spec file
        #[arg(short, long)]
        file: PathBuf,
    },
    /// List a deployment's providers
    Providers {
        #[arg(short, long)]
        deployment: String,
    },
    /// List a deployment's consumers in declaration order
    Consumers {
        #[arg(short, long)]
        deployment: String,
    },
    /// List a deployment's resolved links
    Links {
        #[arg(short, long)]
        deployment: String,
    },
    /// Delete a deployment, its registrations, and every link
    /// referencing them
    DeleteDeployment {
        /// Deployment name
        deployment: String,
    },
    /// Backfill the registries from a legacy link export.
    ///
    /// The export file is JSON with `deployments` (embedded link
    /// specs) and `instances` (embedded consumed-links maps).
    Migrate {
        /// Path to the JSON export file
        #[arg(short, long)]
        file: PathBuf,
        /// Also backfill per-instance resolved content into links
        #[arg(long)]
        include_resolved: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = TetherConfig::load(cli.config.as_deref())?;

    // RUST_LOG wins over the config's filter, which wins over the default.
    let filter = config
        .log
        .as_ref()
        .and_then(|log| log.filter.clone())
        .unwrap_or_else(|| "info,tether=debug".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| filter.parse::<tracing_subscriber::EnvFilter>())?,
        )
        .init();

    let store_path = cli.store.unwrap_or(config.store.path);
    let store = LinkStore::open(&store_path)?;
    tracing::debug!(path = ?store_path, "link store opened");

    match cli.command {
        Commands::Apply { deployment, file } => {
            commands::apply::run(&store, &deployment, &file).await
        }
        Commands::Providers { deployment } => commands::inspect::providers(&store, &deployment),
        Commands::Consumers { deployment } => commands::inspect::consumers(&store, &deployment),
        Commands::Links { deployment } => commands::inspect::links(&store, &deployment),
        Commands::DeleteDeployment { deployment } => {
            commands::inspect::delete_deployment(&store, &deployment)
        }
        Commands::Migrate {
            file,
            include_resolved,
        } => commands::migrate::run(&store, &file, include_resolved),
    }
}
