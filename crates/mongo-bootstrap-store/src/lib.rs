//! Database provisioning for mongo-bootstrap.
//!
//! This crate creates the application user, validated collections, secondary indexes
//! and seed records on an already-formed cluster.
//!
//! # Architecture
//!
//! - [`DocumentStore`]: the four administrative primitives provisioning needs
//! - [`MongoStore`]: the primitives over the `mongodb` driver
//! - [`MemoryStore`]: an in-process namespace with the same observable rules
//!   (existence conflicts, validators, unique indexes), used for dry runs and tests
//! - [`Provisioner`]: runs a [`ProvisionPlan`] against any store, fail-fast
//!
//! # Example
//!
//! ```no_run
//! use mongo_bootstrap_store::{MemoryStore, ProvisionPlan, Provisioner};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provisioner = Provisioner::new(MemoryStore::new("myapp"), ProvisionPlan::default());
//! let report = provisioner.run(chrono::Utc::now()).await?;
//! println!("inserted {} seed documents", report.inserted_total());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod mongo;
pub mod provision;

pub use error::{ProvisionError, Result, Step, StoreError};
pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use provision::{ProvisionPlan, ProvisionReport, Provisioner};

use async_trait::async_trait;
use mongodb::bson::Document;
use mongo_bootstrap_core::{AppUser, CollectionSchema, IndexSpec};

/// Administrative primitives against one database namespace.
///
/// None of the operations check for existing state first: creating a user or
/// collection twice fails, and inserts are not deduplicated beyond what unique
/// indexes enforce.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// The database this store provisions.
    fn database(&self) -> &str;

    /// Create a user on this database.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UserExists` if the user is already defined.
    async fn create_user(&self, user: &AppUser) -> Result<()>;

    /// Create a collection with the schema's validator.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::CollectionExists` if the collection is already present.
    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()>;

    /// Build an index, returning its name.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateKey` if a unique index conflicts with existing
    /// documents.
    async fn create_index(&self, index: &IndexSpec) -> Result<String>;

    /// Insert documents in order, stopping at the first failure. Documents before the
    /// failing one stay inserted.
    ///
    /// Returns the number of documents inserted.
    ///
    /// # Errors
    ///
    /// - `StoreError::ValidationFailed` if a document violates the collection validator.
    /// - `StoreError::DuplicateKey` if a document violates a unique index.
    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize>;
}

#[async_trait]
impl<'a, T: DocumentStore + ?Sized> DocumentStore for &'a T {
    fn database(&self) -> &str {
        (**self).database()
    }

    async fn create_user(&self, user: &AppUser) -> Result<()> {
        (**self).create_user(user).await
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        (**self).create_collection(schema).await
    }

    async fn create_index(&self, index: &IndexSpec) -> Result<String> {
        (**self).create_index(index).await
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize> {
        (**self).insert_many(collection, documents).await
    }
}
