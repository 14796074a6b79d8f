//! Driver-backed administrative client.

use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use mongo_bootstrap_core::ReplicaSetConfig;
use tracing::{debug, instrument};

use crate::admin::{CommandReply, ReplicaSetAdmin};
use crate::error::{Result, TopologyError};

const APP_NAME: &str = "mongo-bootstrap";

/// Runs administrative commands against the `admin` database of one node.
///
/// Before the set exists there is no primary to discover, so the connection string
/// should point at a single seed member with `directConnection=true`.
#[derive(Debug, Clone)]
pub struct MongoAdmin {
    client: Client,
}

impl MongoAdmin {
    /// Connect to `uri`.
    ///
    /// `timeout` bounds server selection and connection establishment so a status poll
    /// against a node that is still starting fails fast instead of hanging.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string cannot be parsed.
    pub async fn connect(uri: &str, timeout: Duration) -> Result<Self> {
        let mut options = ClientOptions::parse(uri).await?;
        options.app_name = Some(APP_NAME.to_string());
        options.server_selection_timeout = Some(timeout);
        options.connect_timeout = Some(timeout);

        let client = Client::with_options(options)?;
        Ok(Self { client })
    }

    fn admin(&self) -> Database {
        self.client.database("admin")
    }
}

#[async_trait]
impl ReplicaSetAdmin for MongoAdmin {
    #[instrument(skip(self, config), fields(set = %config.id))]
    async fn initiate(&self, config: &ReplicaSetConfig) -> Result<CommandReply> {
        let command = doc! { "replSetInitiate": config.to_document() };
        debug!(command = %command, "Submitting replica set configuration");

        let reply = self
            .admin()
            .run_command(command)
            .await
            .map_err(|e| TopologyError::from_driver("replSetInitiate", e))?;
        Ok(CommandReply::new(reply))
    }

    #[instrument(skip(self))]
    async fn status(&self) -> Result<CommandReply> {
        let reply = self
            .admin()
            .run_command(doc! { "replSetGetStatus": 1 })
            .await
            .map_err(|e| TopologyError::from_driver("replSetGetStatus", e))?;
        Ok(CommandReply::new(reply))
    }
}
