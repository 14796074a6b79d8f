//! mongo-bootstrap - one-shot MongoDB replica set and database setup
//!
//! This is the main entry point for the mongo-bootstrap binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mongo_bootstrap_cli::commands;
use mongo_bootstrap_cli::config::CONFIG_PATH_ENV;
use mongo_bootstrap_cli::BootstrapConfig;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// JSON config file (defaults apply when omitted)
    #[arg(short, long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initiate the replica set and wait for it to report ready
    InitReplica {
        /// Keep polling until a primary is elected
        #[arg(long)]
        require_primary: bool,
    },
    /// Create the application user, collections, indexes and seed data
    Provision {
        /// Run against an in-memory store instead of the server
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mongo_bootstrap=debug".into()),
        )
        // stdout is reserved for show-config output
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = BootstrapConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::InitReplica { require_primary } => {
            let outcome = commands::init_replica(&config, require_primary).await?;
            tracing::info!(
                ready = outcome.is_ready(),
                attempts = outcome.attempts(),
                "Replica set initialization finished"
            );
        }
        Commands::Provision { dry_run } => {
            let report = commands::provision(&config, dry_run).await?;
            tracing::info!(
                database = %report.database,
                inserted = report.inserted_total(),
                dry_run,
                "Provisioning finished"
            );
        }
        Commands::ShowConfig => {
            println!("{}", commands::show_config(&config)?);
        }
    }

    Ok(())
}
