//! Administrative command surface.

use std::fmt;

use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use mongo_bootstrap_core::ReplicaSetConfig;

use crate::error::Result;

/// The two administrative commands the initializer needs.
///
/// Implemented over the driver by [`crate::MongoAdmin`]; tests substitute scripted
/// implementations.
#[async_trait]
pub trait ReplicaSetAdmin: Send + Sync {
    /// Run `replSetInitiate` with `config`.
    async fn initiate(&self, config: &ReplicaSetConfig) -> Result<CommandReply>;

    /// Run `replSetGetStatus`.
    async fn status(&self) -> Result<CommandReply>;
}

/// A raw command reply.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReply(Document);

impl CommandReply {
    /// Wrap a reply document.
    #[must_use]
    pub const fn new(document: Document) -> Self {
        Self(document)
    }

    /// The reply document.
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.0
    }

    /// Whether the `ok` field equals 1, whatever its numeric type.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        match self.0.get("ok") {
            Some(Bson::Double(ok)) => (*ok - 1.0).abs() < f64::EPSILON,
            Some(Bson::Int32(ok)) => *ok == 1,
            Some(Bson::Int64(ok)) => *ok == 1,
            Some(Bson::Boolean(ok)) => *ok,
            _ => false,
        }
    }

    /// The `set` field of a status reply.
    #[must_use]
    pub fn set_name(&self) -> Option<&str> {
        self.0.get_str("set").ok()
    }

    /// `(name, stateStr)` for each member listed in a status reply.
    #[must_use]
    pub fn member_states(&self) -> Vec<(&str, &str)> {
        let Ok(members) = self.0.get_array("members") else {
            return Vec::new();
        };
        members
            .iter()
            .filter_map(|member| match member {
                Bson::Document(m) => Some((
                    m.get_str("name").unwrap_or("?"),
                    m.get_str("stateStr").unwrap_or("UNKNOWN"),
                )),
                _ => None,
            })
            .collect()
    }

    /// Name of the member reporting `PRIMARY`, if any.
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        self.member_states()
            .into_iter()
            .find(|(_, state)| *state == "PRIMARY")
            .map(|(name, _)| name)
    }
}

impl From<Document> for CommandReply {
    fn from(document: Document) -> Self {
        Self(document)
    }
}

impl fmt::Display for CommandReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
