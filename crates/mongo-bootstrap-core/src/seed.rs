//! Seed records.
//!
//! Seed documents are kept as extended JSON so they can live in a config file. Fields
//! named in `timestamp_fields` are overwritten with the provisioning time when the
//! batch is materialized.

use bson::{Bson, DateTime as BsonDateTime, Document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{CoreError, Result};

/// Documents inserted into one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedBatch {
    /// Target collection.
    pub collection: String,
    /// Fields stamped with the provisioning time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timestamp_fields: Vec<String>,
    /// Extended JSON documents.
    pub documents: Vec<serde_json::Value>,
}

impl SeedBatch {
    /// Create a batch without timestamp fields.
    #[must_use]
    pub fn new(collection: impl Into<String>, documents: Vec<serde_json::Value>) -> Self {
        Self {
            collection: collection.into(),
            timestamp_fields: Vec::new(),
            documents,
        }
    }

    /// Stamp `fields` at materialization.
    #[must_use]
    pub fn stamped<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.timestamp_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Convert to BSON documents, stamping timestamp fields with `now`.
    ///
    /// Integers that fit in 32 bits become `int`, larger ones `long`, fractions `double`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidSeed` if an entry is not a JSON object or is not
    /// valid extended JSON.
    pub fn materialize(&self, now: DateTime<Utc>) -> Result<Vec<Document>> {
        let stamp = BsonDateTime::from_millis(now.timestamp_millis());

        self.documents
            .iter()
            .enumerate()
            .map(|(position, value)| {
                let invalid = |message: String| CoreError::InvalidSeed {
                    collection: self.collection.clone(),
                    position,
                    message,
                };

                let mut document = match Bson::try_from(value.clone()) {
                    Ok(Bson::Document(document)) => document,
                    Ok(other) => {
                        return Err(invalid(format!("expected an object, found {other}")))
                    }
                    Err(e) => return Err(invalid(e.to_string())),
                };
                for field in &self.timestamp_fields {
                    document.insert(field.clone(), stamp);
                }
                Ok(document)
            })
            .collect()
    }
}

/// The two sample users and two sample products.
#[must_use]
pub fn default_seeds() -> Vec<SeedBatch> {
    vec![
        SeedBatch::new(
            "users",
            vec![
                json!({
                    "username": "john_doe",
                    "email": "john@example.com",
                    "fullName": "John Doe",
                }),
                json!({
                    "username": "jane_smith",
                    "email": "jane@example.com",
                    "fullName": "Jane Smith",
                }),
            ],
        )
        .stamped(["createdAt", "updatedAt"]),
        SeedBatch::new(
            "products",
            vec![
                json!({
                    "name": "Laptop Gaming",
                    "price": 25_000_000,
                    "category": "Electronics",
                    "description": "Laptop gaming cao cấp",
                    "stock": 10,
                }),
                json!({
                    "name": "Áo thun nam",
                    "price": 199_000,
                    "category": "Fashion",
                    "description": "Áo thun cotton 100%",
                    "stock": 50,
                }),
            ],
        )
        .stamped(["createdAt"]),
    ]
}
