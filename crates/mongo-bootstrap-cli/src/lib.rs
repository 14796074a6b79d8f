//! Command-line entry point for mongo-bootstrap.
//!
//! The binary exposes three subcommands:
//!
//! - `init-replica`: initiate the replica set and wait for it to come up
//! - `provision`: create the application user, collections, indexes and seed data
//! - `show-config`: print the effective configuration with secrets masked
//!
//! Configuration comes from an optional JSON file plus environment overrides, see
//! [`BootstrapConfig`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod commands;
pub mod config;
pub mod error;

pub use config::{BootstrapConfig, ConfigError};
pub use error::{CliError, Result};
