//! MongoDB-backed store.

use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::Document;
use mongodb::error::{Error as DriverError, ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Database, IndexModel};
use mongo_bootstrap_core::{AppUser, CollectionSchema, IndexSpec};
use tracing::{debug, instrument};

use crate::error::{Result, StoreError};
use crate::DocumentStore;

const APP_NAME: &str = "mongo-bootstrap";

/// Server error codes the store maps to typed errors.
mod codes {
    pub const NAMESPACE_EXISTS: i32 = 48;
    pub const DOCUMENT_VALIDATION_FAILURE: i32 = 121;
    pub const DUPLICATE_KEY: i32 = 11000;
    pub const USER_ALREADY_EXISTS: i32 = 51003;
}

/// Provisions one database through the driver.
#[derive(Debug, Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connect to `uri` and bind to `database`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string cannot be parsed.
    pub async fn connect(uri: &str, database: &str, timeout: Duration) -> Result<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        options.app_name = Some(APP_NAME.to_string());
        options.server_selection_timeout = Some(timeout);
        options.connect_timeout = Some(timeout);

        let client =
            Client::with_options(options).map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(Self::new(&client, database))
    }

    /// Bind an existing client to `database`.
    #[must_use]
    pub fn new(client: &Client, database: &str) -> Self {
        Self {
            db: client.database(database),
        }
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn database(&self) -> &str {
        self.db.name()
    }

    #[instrument(skip_all, fields(user = %user.name))]
    async fn create_user(&self, user: &AppUser) -> Result<()> {
        self.db
            .run_command(user.create_user_command(self.db.name()))
            .await
            .map_err(|e| match server_code(&e) {
                Some(codes::USER_ALREADY_EXISTS) => StoreError::UserExists {
                    user: user.name.clone(),
                    database: self.db.name().to_string(),
                },
                _ => StoreError::Database(e.to_string()),
            })?;
        Ok(())
    }

    #[instrument(skip_all, fields(collection = %schema.name))]
    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        self.db
            .create_collection(&schema.name)
            .validator(schema.validator_document())
            .await
            .map_err(|e| match server_code(&e) {
                Some(codes::NAMESPACE_EXISTS) => StoreError::CollectionExists(schema.name.clone()),
                _ => StoreError::Database(e.to_string()),
            })?;
        Ok(())
    }

    #[instrument(skip_all, fields(collection = %index.collection, index = %index.name()))]
    async fn create_index(&self, index: &IndexSpec) -> Result<String> {
        let options = IndexOptions::builder()
            .name(index.name())
            .unique(index.unique)
            .build();
        let model = IndexModel::builder()
            .keys(index.keys_document())
            .options(options)
            .build();

        let created = self
            .db
            .collection::<Document>(&index.collection)
            .create_index(model)
            .await
            .map_err(|e| map_write_error(&index.collection, &e))?;
        debug!(name = %created.index_name, "Index built");
        Ok(created.index_name)
    }

    #[instrument(skip_all, fields(collection = %collection, count = documents.len()))]
    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let result = self
            .db
            .collection::<Document>(collection)
            .insert_many(documents)
            .await
            .map_err(|e| map_write_error(collection, &e))?;
        Ok(result.inserted_ids.len())
    }
}

fn map_write_error(collection: &str, err: &DriverError) -> StoreError {
    match server_failure(err) {
        Some((codes::DUPLICATE_KEY, message)) => StoreError::DuplicateKey {
            collection: collection.to_string(),
            index: duplicate_index(message).unwrap_or("unknown").to_string(),
            key: duplicate_key(message).unwrap_or(message).to_string(),
        },
        Some((codes::DOCUMENT_VALIDATION_FAILURE, message)) => StoreError::ValidationFailed {
            collection: collection.to_string(),
            reason: message.to_string(),
        },
        _ => StoreError::Database(err.to_string()),
    }
}

/// The index name from an `E11000 ... index: <name> dup key: ...` message.
fn duplicate_index(message: &str) -> Option<&str> {
    let (_, rest) = message.split_once(" index: ")?;
    rest.split_whitespace().next()
}

/// The `{ field: value }` part of an `E11000` message.
fn duplicate_key(message: &str) -> Option<&str> {
    message
        .split_once("dup key: ")
        .map(|(_, key)| key.trim())
        .filter(|key| !key.is_empty())
}

/// The server error code carried by a command, write, or bulk insert failure.
fn server_code(err: &DriverError) -> Option<i32> {
    server_failure(err).map(|(code, _)| code)
}

/// Code and server message of the first command, write, or bulk insert failure.
fn server_failure(err: &DriverError) -> Option<(i32, &str)> {
    match *err.kind {
        ErrorKind::Command(ref failure) => Some((failure.code, failure.message.as_str())),
        ErrorKind::Write(WriteFailure::WriteError(ref failure)) => {
            Some((failure.code, failure.message.as_str()))
        }
        ErrorKind::InsertMany(ref failure) => failure
            .write_errors
            .as_ref()
            .and_then(|errors| errors.first())
            .map(|e| (e.code, e.message.as_str())),
        _ => None,
    }
}
