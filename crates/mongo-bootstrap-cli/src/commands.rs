//! Subcommand implementations.

use chrono::Utc;
use mongo_bootstrap_store::{
    DocumentStore, MemoryStore, MongoStore, ProvisionPlan, ProvisionReport, Provisioner,
};
use mongo_bootstrap_topology::{MongoAdmin, PollOutcome, ReplicaSetAdmin, TopologyInitializer};
use tracing::{info, warn};

use crate::config::{redact_uri, BootstrapConfig};
use crate::error::{CliError, Result};

/// Connect to the seed member and bring the replica set up.
///
/// # Errors
///
/// Returns `CliError::Topology` if the seed URI is unusable and `CliError::InitFailed`
/// if initiation is rejected or polling hits a permanent error. Running out of
/// attempts is not an error.
pub async fn init_replica(config: &BootstrapConfig, require_primary: bool) -> Result<PollOutcome> {
    info!(seed_uri = %redact_uri(&config.seed_uri), "Connecting to seed member");
    let admin = MongoAdmin::connect(&config.seed_uri, config.connect_timeout()).await?;
    initialize(admin, config, require_primary).await
}

/// Run the initializer with `admin`.
///
/// `require_primary` is combined with the configured setting.
///
/// # Errors
///
/// Returns `CliError::InitFailed` for a `Failed` outcome.
pub async fn initialize<A: ReplicaSetAdmin>(
    admin: A,
    config: &BootstrapConfig,
    require_primary: bool,
) -> Result<PollOutcome> {
    let outcome = TopologyInitializer::new(admin, config.replica_set.clone())
        .with_policy(config.retry)
        .with_require_primary(require_primary || config.require_primary)
        .run()
        .await;

    match outcome {
        PollOutcome::Failed { attempts, reason } => Err(CliError::InitFailed { attempts, reason }),
        PollOutcome::TimedOut { attempts } => {
            warn!(attempts, "Continuing without a confirmed replica set");
            Ok(PollOutcome::TimedOut { attempts })
        }
        ready @ PollOutcome::Ready { .. } => Ok(ready),
    }
}

/// Provision the application database, or rehearse against memory with `dry_run`.
///
/// # Errors
///
/// Returns `CliError::Store` if the URI is unusable and `CliError::Provision` for the
/// first failing step.
pub async fn provision(config: &BootstrapConfig, dry_run: bool) -> Result<ProvisionReport> {
    let plan = config.provision_plan();
    if dry_run {
        info!(database = %config.database, "🧪 Dry run against an in-memory store");
        return run_plan(MemoryStore::new(config.database.as_str()), plan).await;
    }

    info!(uri = %redact_uri(&config.uri), database = %config.database, "Connecting to replica set");
    let store = MongoStore::connect(&config.uri, &config.database, config.connect_timeout()).await?;
    run_plan(store, plan).await
}

/// Run `plan` against `store`, stamping seeds with the current time.
///
/// # Errors
///
/// Returns `CliError::Provision` for the first failing step.
pub async fn run_plan<S: DocumentStore>(store: S, plan: ProvisionPlan) -> Result<ProvisionReport> {
    Ok(Provisioner::new(store, plan).run(Utc::now()).await?)
}

/// The effective configuration as pretty JSON, password masked.
///
/// # Errors
///
/// Returns `CliError::Json` if serialization fails.
pub fn show_config(config: &BootstrapConfig) -> Result<String> {
    Ok(serde_json::to_string_pretty(&config.redacted())?)
}
