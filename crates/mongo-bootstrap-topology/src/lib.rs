//! Replica set initialization for mongo-bootstrap.
//!
//! Submits a membership descriptor with `replSetInitiate` exactly once, then polls
//! `replSetGetStatus` on a fixed interval until the set reports ready or the retry
//! budget is spent. Status failures are classified: transient ones (node still
//! starting, election in progress) are retried, permanent ones end the run.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use mongo_bootstrap_core::ReplicaSetConfig;
//! use mongo_bootstrap_topology::{MongoAdmin, TopologyInitializer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let admin = MongoAdmin::connect(
//!     "mongodb://mongo1:27017/?directConnection=true",
//!     Duration::from_secs(5),
//! )
//! .await?;
//!
//! let outcome = TopologyInitializer::new(admin, ReplicaSetConfig::default())
//!     .run()
//!     .await;
//! println!("ready: {}", outcome.is_ready());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod admin;
mod error;
mod initializer;
mod mongo;

pub use admin::{CommandReply, ReplicaSetAdmin};
pub use error::{classify_code, ErrorClass, Result, TopologyError, TRANSIENT_CODES};
pub use initializer::{PollOutcome, TopologyInitializer};
pub use mongo::MongoAdmin;
