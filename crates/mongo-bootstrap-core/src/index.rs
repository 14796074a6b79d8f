//! Secondary index descriptors.

use std::fmt;

use bson::Document;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Key direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending (`1`).
    Asc,
    /// Descending (`-1`).
    Desc,
}

impl SortOrder {
    /// The numeric form used in key documents.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

/// One component of an index key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexKey {
    /// Indexed field, dotted for embedded fields.
    pub field: String,
    /// Direction.
    #[serde(default = "default_order")]
    pub order: SortOrder,
}

const fn default_order() -> SortOrder {
    SortOrder::Asc
}

/// An index on one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexSpec {
    /// Target collection.
    pub collection: String,
    /// Ordered key components.
    pub keys: Vec<IndexKey>,
    /// Reject documents whose key duplicates an existing one.
    #[serde(default)]
    pub unique: bool,
}

impl IndexSpec {
    /// Single-field ascending index.
    #[must_use]
    pub fn ascending(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self::single(collection, field, SortOrder::Asc)
    }

    /// Single-field descending index.
    #[must_use]
    pub fn descending(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self::single(collection, field, SortOrder::Desc)
    }

    fn single(collection: impl Into<String>, field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            collection: collection.into(),
            keys: vec![IndexKey {
                field: field.into(),
                order,
            }],
            unique: false,
        }
    }

    /// Append another key component.
    #[must_use]
    pub fn then(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.keys.push(IndexKey {
            field: field.into(),
            order,
        });
        self
    }

    /// Mark the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// The key document, e.g. `{ createdAt: -1 }`.
    #[must_use]
    pub fn keys_document(&self) -> Document {
        self.keys
            .iter()
            .map(|k| (k.field.clone(), k.order.as_i32().into()))
            .collect()
    }

    /// The server's default index name, e.g. `createdAt_-1`.
    #[must_use]
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|k| format!("{}_{}", k.field, k.order))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Check that the index has keys and no field repeats.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidIndex` otherwise.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| CoreError::InvalidIndex {
            collection: self.collection.clone(),
            message: message.to_string(),
        };

        if self.keys.is_empty() {
            return Err(invalid("index needs at least one key"));
        }
        for (i, key) in self.keys.iter().enumerate() {
            if key.field.is_empty() {
                return Err(invalid("index key field must not be empty"));
            }
            if self.keys[..i].iter().any(|k| k.field == key.field) {
                return Err(invalid("index key fields must be distinct"));
            }
        }
        Ok(())
    }
}

/// Indexes created by default: unique `username`/`email` on `users`, lookups on
/// `products.name`, `products.category`, `orders.userId`, and newest-first
/// `orders.createdAt`.
#[must_use]
pub fn default_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec::ascending("users", "username").unique(),
        IndexSpec::ascending("users", "email").unique(),
        IndexSpec::ascending("products", "name"),
        IndexSpec::ascending("products", "category"),
        IndexSpec::ascending("orders", "userId"),
        IndexSpec::descending("orders", "createdAt"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_names_follow_server_convention() {
        let names: Vec<_> = default_indexes().iter().map(IndexSpec::name).collect();
        assert_eq!(
            names,
            [
                "username_1",
                "email_1",
                "name_1",
                "category_1",
                "userId_1",
                "createdAt_-1"
            ]
        );
    }

    #[test]
    fn only_user_identity_indexes_are_unique() {
        let unique: Vec<_> = default_indexes()
            .into_iter()
            .filter(|i| i.unique)
            .map(|i| i.name())
            .collect();
        assert_eq!(unique, ["username_1", "email_1"]);
    }

    #[test]
    fn compound_key_document_keeps_order() {
        let index = IndexSpec::ascending("orders", "userId").then("createdAt", SortOrder::Desc);
        let keys = index.keys_document();
        let fields: Vec<_> = keys.keys().cloned().collect();
        assert_eq!(fields, ["userId", "createdAt"]);
        assert_eq!(keys.get_i32("createdAt").unwrap(), -1);
        assert_eq!(index.name(), "userId_1_createdAt_-1");
    }

    #[test]
    fn rejects_empty_and_repeated_keys() {
        let mut index = IndexSpec::ascending("users", "email");
        index.keys.clear();
        assert!(index.validate().is_err());

        let repeated = IndexSpec::ascending("users", "email").then("email", SortOrder::Desc);
        assert!(repeated.validate().is_err());
    }

    #[test]
    fn parses_with_default_direction() {
        let index: IndexSpec = serde_json::from_str(
            r#"{"collection":"users","keys":[{"field":"email"}],"unique":true}"#,
        )
        .unwrap();
        assert_eq!(index, IndexSpec::ascending("users", "email").unique());
    }
}
