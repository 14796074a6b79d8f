//! Core types for mongo-bootstrap.
//!
//! This crate holds the declarative model shared by the topology initializer and the
//! schema provisioner. Nothing here performs I/O:
//!
//! - **Membership**: `ReplicaSetConfig`, `MemberConfig`
//! - **Schemas**: `CollectionSchema`, `SchemaNode`, `BsonType`
//! - **Indexes**: `IndexSpec`, `IndexKey`, `SortOrder`
//! - **Seed data**: `SeedBatch`
//! - **Credentials**: `AppUser`, `RoleGrant`
//! - **Polling**: `RetryPolicy`
//!
//! Every `default_*` constructor reproduces the stock `myapp` deployment: a three node
//! replica set `rs0`, the `users`/`products`/`orders` collections and their seed records.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod credential;
pub mod error;
pub mod index;
pub mod membership;
pub mod retry;
pub mod schema;
pub mod seed;

pub use credential::{AppUser, RoleGrant, DEFAULT_APP_PASSWORD, DEFAULT_APP_USER};
pub use error::{CoreError, Result};
pub use index::{default_indexes, IndexKey, IndexSpec, SortOrder};
pub use membership::{MemberConfig, ReplicaSetConfig, DEFAULT_REPLICA_SET_ID};
pub use retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_DELAY_SECS};
pub use schema::{
    default_schemas, numeric_value, BsonType, CollectionSchema, SchemaNode, ValidationError,
};
pub use seed::{default_seeds, SeedBatch};

/// Name of the application database provisioned by default.
pub const DEFAULT_DATABASE: &str = "myapp";
