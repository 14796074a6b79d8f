//! Error types for the command-line entry point.

use mongo_bootstrap_store::{ProvisionError, StoreError};
use mongo_bootstrap_topology::TopologyError;

use crate::config::ConfigError;

/// Result type for commands.
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that end a command with a nonzero exit status.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Could not reach the seed member.
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// Could not reach the provisioning target.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A provisioning step failed.
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// Initiation was rejected or polling hit a permanent error.
    #[error("replica set initialization failed after {attempts} status checks: {reason}")]
    InitFailed {
        /// Status checks performed.
        attempts: u32,
        /// Why it failed.
        reason: String,
    },

    /// Output could not be rendered.
    #[error("failed to render output: {0}")]
    Json(#[from] serde_json::Error),
}
