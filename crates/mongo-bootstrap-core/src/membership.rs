//! Replica set membership descriptor.
//!
//! The descriptor is submitted verbatim to `replSetInitiate`. Election weighting is left
//! to the server; this module only guards the invariants the server would otherwise
//! reject with a less helpful message.

use std::collections::HashSet;

use bson::{doc, Document};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Replica set name used when none is configured.
pub const DEFAULT_REPLICA_SET_ID: &str = "rs0";

/// A single replica set member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberConfig {
    /// Member id, unique within the set.
    pub id: u32,
    /// Network address as `host:port`.
    pub host: String,
    /// Relative election priority, must be positive.
    #[serde(default = "default_priority")]
    pub priority: u32,
}

const fn default_priority() -> u32 {
    1
}

impl MemberConfig {
    /// Create a member descriptor.
    #[must_use]
    pub fn new(id: u32, host: impl Into<String>, priority: u32) -> Self {
        Self {
            id,
            host: host.into(),
            priority,
        }
    }
}

/// The replica set configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplicaSetConfig {
    /// Replica set name (`_id` in the server document).
    pub id: String,
    /// Configuration version, monotonically increasing.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Ordered member list.
    pub members: Vec<MemberConfig>,
}

const fn default_version() -> u32 {
    1
}

impl Default for ReplicaSetConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICA_SET_ID)
            .with_member("mongo1:27017", 2)
            .with_member("mongo2:27017", 1)
            .with_member("mongo3:27017", 1)
    }
}

impl ReplicaSetConfig {
    /// Create an empty configuration at version 1.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: default_version(),
            members: Vec::new(),
        }
    }

    /// Append a member, assigning the next sequential id.
    #[must_use]
    pub fn with_member(mut self, host: impl Into<String>, priority: u32) -> Self {
        let id = self.members.iter().map(|m| m.id + 1).max().unwrap_or(0);
        self.members.push(MemberConfig::new(id, host, priority));
        self
    }

    /// Look up a member by id.
    #[must_use]
    pub fn member(&self, id: u32) -> Option<&MemberConfig> {
        self.members.iter().find(|m| m.id == id)
    }

    /// Check the descriptor invariants.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidMembership` if the set name is empty, there are no
    /// members, a member id or host repeats, a host is not `host:port`, or a priority
    /// is zero.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(CoreError::InvalidMembership(
                "replica set id must not be empty".into(),
            ));
        }
        if self.members.is_empty() {
            return Err(CoreError::InvalidMembership(
                "at least one member is required".into(),
            ));
        }

        let mut ids = HashSet::new();
        let mut hosts = HashSet::new();
        for member in &self.members {
            if !ids.insert(member.id) {
                return Err(CoreError::InvalidMembership(format!(
                    "duplicate member id {}",
                    member.id
                )));
            }
            if !hosts.insert(member.host.to_ascii_lowercase()) {
                return Err(CoreError::InvalidMembership(format!(
                    "duplicate member host {}",
                    member.host
                )));
            }
            check_host(&member.host)?;
            if member.priority == 0 {
                return Err(CoreError::InvalidMembership(format!(
                    "member {} must have a positive priority",
                    member.id
                )));
            }
        }

        Ok(())
    }

    /// Render the `replSetInitiate` argument.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let members: Vec<Document> = self
            .members
            .iter()
            .map(|m| {
                doc! {
                    "_id": i64::from(m.id),
                    "host": &m.host,
                    "priority": i64::from(m.priority),
                }
            })
            .collect();

        doc! {
            "_id": &self.id,
            "version": i64::from(self.version),
            "members": members,
        }
    }
}

fn check_host(host: &str) -> Result<()> {
    let invalid = || CoreError::InvalidMembership(format!("member host must be host:port, got {host:?}"));

    let (name, port) = host.rsplit_once(':').ok_or_else(invalid)?;
    if name.is_empty() {
        return Err(invalid());
    }
    match port.parse::<u16>() {
        Ok(p) if p > 0 => Ok(()),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Bson;

    #[test]
    fn default_config_is_three_members() {
        let config = ReplicaSetConfig::default();
        assert_eq!(config.id, "rs0");
        assert_eq!(config.version, 1);
        assert_eq!(config.members.len(), 3);
        assert_eq!(config.member(0).unwrap().host, "mongo1:27017");
        assert_eq!(config.member(0).unwrap().priority, 2);
        assert_eq!(config.member(2).unwrap().priority, 1);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut config = ReplicaSetConfig::default();
        config.members[2].id = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate member id 0"));
    }

    #[test]
    fn rejects_duplicate_hosts() {
        let config = ReplicaSetConfig::new("rs0")
            .with_member("mongo1:27017", 1)
            .with_member("MONGO1:27017", 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_priority() {
        let config = ReplicaSetConfig::new("rs0").with_member("mongo1:27017", 0);
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidMembership(_))
        ));
    }

    #[test]
    fn rejects_malformed_hosts() {
        for host in ["mongo1", ":27017", "mongo1:0", "mongo1:port", "mongo1:70000"] {
            let config = ReplicaSetConfig::new("rs0").with_member(host, 1);
            assert!(config.validate().is_err(), "{host} should be rejected");
        }
    }

    #[test]
    fn rejects_empty_member_list() {
        assert!(ReplicaSetConfig::new("rs0").validate().is_err());
    }

    #[test]
    fn document_shape() {
        let document = ReplicaSetConfig::default().to_document();
        assert_eq!(document.get_str("_id").unwrap(), "rs0");
        assert_eq!(document.get_i64("version").unwrap(), 1);

        let members = document.get_array("members").unwrap();
        assert_eq!(members.len(), 3);
        let Bson::Document(first) = &members[0] else {
            panic!("member should be a document");
        };
        assert_eq!(first.get_i64("_id").unwrap(), 0);
        assert_eq!(first.get_str("host").unwrap(), "mongo1:27017");
        assert_eq!(first.get_i64("priority").unwrap(), 2);
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: ReplicaSetConfig = serde_json::from_str(
            r#"{"id":"rs1","members":[{"id":7,"host":"db:27018"}]}"#,
        )
        .unwrap();
        assert_eq!(config.version, 1);
        assert_eq!(config.members[0].priority, 1);
        config.validate().unwrap();
    }
}
