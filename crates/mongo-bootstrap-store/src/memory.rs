//! In-memory store.
//!
//! Mirrors the server rules provisioning depends on: users and collections cannot be
//! created twice, validators run on insert, unique indexes are enforced against both
//! stored documents and earlier documents of the same batch, and collections touched
//! by `create_index` or `insert_many` before `create_collection` are created implicitly
//! without a validator.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};
use mongo_bootstrap_core::{numeric_value, AppUser, CollectionSchema, IndexSpec, SchemaNode};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::DocumentStore;

#[derive(Debug)]
struct Collection {
    schema: CollectionSchema,
    indexes: Vec<IndexSpec>,
    documents: Vec<Document>,
}

impl Collection {
    fn implicit(name: &str) -> Self {
        Self {
            schema: CollectionSchema::new(name, SchemaNode::default()),
            indexes: Vec::new(),
            documents: Vec::new(),
        }
    }

    /// The first stored document sharing `document`'s key on a unique index.
    fn conflict(&self, document: &Document) -> Option<(&IndexSpec, Vec<Bson>)> {
        self.indexes.iter().filter(|i| i.unique).find_map(|index| {
            let key = index_key(index, document);
            self.documents
                .iter()
                .any(|existing| same_key(&index_key(index, existing), &key))
                .then_some((index, key))
        })
    }
}

#[derive(Debug, Default)]
struct Namespace {
    users: BTreeSet<String>,
    collections: BTreeMap<String, Collection>,
}

/// A single database namespace held in memory.
#[derive(Debug)]
pub struct MemoryStore {
    database: String,
    state: Mutex<Namespace>,
}

impl MemoryStore {
    /// Create an empty namespace.
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            state: Mutex::new(Namespace::default()),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, Namespace>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }

    /// Whether `name` has been created.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn has_user(&self, name: &str) -> Result<bool> {
        Ok(self.state()?.users.contains(name))
    }

    /// Index names on `collection`, in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn index_names(&self, collection: &str) -> Result<Vec<String>> {
        Ok(self
            .state()?
            .collections
            .get(collection)
            .map(|c| c.indexes.iter().map(IndexSpec::name).collect())
            .unwrap_or_default())
    }

    /// Stored documents of `collection`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn documents(&self, collection: &str) -> Result<Vec<Document>> {
        Ok(self
            .state()?
            .collections
            .get(collection)
            .map(|c| c.documents.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn database(&self) -> &str {
        &self.database
    }

    async fn create_user(&self, user: &AppUser) -> Result<()> {
        let mut state = self.state()?;
        if !state.users.insert(user.name.clone()) {
            return Err(StoreError::UserExists {
                user: user.name.clone(),
                database: self.database.clone(),
            });
        }
        debug!(user = %user.name, database = %self.database, "Created user in memory");
        Ok(())
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        let mut state = self.state()?;
        if state.collections.contains_key(&schema.name) {
            return Err(StoreError::CollectionExists(schema.name.clone()));
        }
        state.collections.insert(
            schema.name.clone(),
            Collection {
                schema: schema.clone(),
                indexes: Vec::new(),
                documents: Vec::new(),
            },
        );
        Ok(())
    }

    async fn create_index(&self, index: &IndexSpec) -> Result<String> {
        let mut state = self.state()?;
        let collection = state
            .collections
            .entry(index.collection.clone())
            .or_insert_with(|| Collection::implicit(&index.collection));

        let name = index.name();
        if collection.indexes.iter().any(|i| i.name() == name) {
            // Same key pattern again is a no-op on the server.
            return Ok(name);
        }

        if index.unique {
            let mut seen: Vec<Vec<Bson>> = Vec::new();
            for document in &collection.documents {
                let key = index_key(index, document);
                if seen.iter().any(|earlier| same_key(earlier, &key)) {
                    return Err(StoreError::DuplicateKey {
                        collection: index.collection.clone(),
                        index: name,
                        key: format_key(&key),
                    });
                }
                seen.push(key);
            }
        }

        collection.indexes.push(index.clone());
        Ok(name)
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize> {
        let mut state = self.state()?;
        let target = state
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection::implicit(collection));

        let mut inserted = 0;
        for mut document in documents {
            if !document.contains_key("_id") {
                document.insert("_id", ObjectId::new());
            }

            target
                .schema
                .validate(&document)
                .map_err(|e| StoreError::ValidationFailed {
                    collection: collection.to_string(),
                    reason: e.to_string(),
                })?;

            if let Some((index, key)) = target.conflict(&document) {
                return Err(StoreError::DuplicateKey {
                    collection: collection.to_string(),
                    index: index.name(),
                    key: format_key(&key),
                });
            }

            target.documents.push(document);
            inserted += 1;
        }

        Ok(inserted)
    }
}

/// Key values of `document` for `index`; missing fields index as null.
fn index_key(index: &IndexSpec, document: &Document) -> Vec<Bson> {
    index
        .keys
        .iter()
        .map(|k| lookup(document, &k.field).cloned().unwrap_or(Bson::Null))
        .collect()
}

/// Key equality as the server sees it: numbers compare by value across types.
#[allow(clippy::float_cmp)]
fn same_key(a: &[Bson], b: &[Bson]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| match (numeric_value(x), numeric_value(y)) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        })
}

fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        match current {
            Bson::Document(inner) => current = inner.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

fn format_key(key: &[Bson]) -> String {
    key.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;
    use mongo_bootstrap_core::{default_schemas, BsonType};

    fn users_schema() -> CollectionSchema {
        default_schemas().remove(0)
    }

    #[tokio::test]
    async fn user_cannot_be_created_twice() {
        let store = MemoryStore::new("myapp");
        store.create_user(&AppUser::default()).await.unwrap();
        assert!(store.has_user("appuser").unwrap());

        let err = store.create_user(&AppUser::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::UserExists { ref user, .. } if user == "appuser"));
    }

    #[tokio::test]
    async fn collection_cannot_be_created_twice() {
        let store = MemoryStore::new("myapp");
        store.create_collection(&users_schema()).await.unwrap();

        let err = store.create_collection(&users_schema()).await.unwrap_err();
        assert!(matches!(err, StoreError::CollectionExists(ref name) if name == "users"));
    }

    #[tokio::test]
    async fn insert_assigns_object_ids() {
        let store = MemoryStore::new("myapp");
        store
            .insert_many("notes", vec![doc! { "text": "a" }, doc! { "_id": 7, "text": "b" }])
            .await
            .unwrap();

        let documents = store.documents("notes").unwrap();
        assert!(documents[0].get_object_id("_id").is_ok());
        assert_eq!(documents[1].get_i32("_id").unwrap(), 7);
    }

    #[tokio::test]
    async fn ordered_insert_keeps_documents_before_failure() {
        let store = MemoryStore::new("myapp");
        store
            .create_collection(&CollectionSchema::new(
                "numbers",
                SchemaNode::object().property("n", SchemaNode::of(BsonType::Int).with_minimum(0.0)),
            ))
            .await
            .unwrap();

        let err = store
            .insert_many(
                "numbers",
                vec![doc! { "n": 1 }, doc! { "n": -1 }, doc! { "n": 2 }],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::ValidationFailed { .. }));
        assert_eq!(store.documents("numbers").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unique_index_checks_same_batch() {
        let store = MemoryStore::new("myapp");
        store
            .create_index(&IndexSpec::ascending("tags", "label").unique())
            .await
            .unwrap();

        let err = store
            .insert_many("tags", vec![doc! { "label": "x" }, doc! { "label": "x" }])
            .await
            .unwrap_err();

        let StoreError::DuplicateKey { index, key, .. } = &err else {
            panic!("expected duplicate key, got {err:?}");
        };
        assert_eq!(index, "label_1");
        assert_eq!(key, "\"x\"");
    }

    #[tokio::test]
    async fn missing_fields_collide_as_null() {
        let store = MemoryStore::new("myapp");
        store
            .create_index(&IndexSpec::ascending("tags", "label").unique())
            .await
            .unwrap();
        store.insert_many("tags", vec![doc! {}]).await.unwrap();

        let err = store.insert_many("tags", vec![doc! {}]).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
    }

    #[tokio::test]
    async fn unique_index_over_existing_duplicates_fails() {
        let store = MemoryStore::new("myapp");
        store
            .insert_many("tags", vec![doc! { "label": "x" }, doc! { "label": "x" }])
            .await
            .unwrap();

        let err = store
            .create_index(&IndexSpec::ascending("tags", "label").unique())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
        assert!(store.index_names("tags").unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_index_is_a_no_op() {
        let store = MemoryStore::new("myapp");
        let index = IndexSpec::descending("orders", "createdAt");
        store.create_index(&index).await.unwrap();
        store.create_index(&index).await.unwrap();
        assert_eq!(store.index_names("orders").unwrap(), ["createdAt_-1"]);
    }

    #[tokio::test]
    async fn unique_index_compares_numbers_by_value() {
        let store = MemoryStore::new("myapp");
        store
            .create_index(&IndexSpec::ascending("codes", "code").unique())
            .await
            .unwrap();
        store.insert_many("codes", vec![doc! { "code": 1 }]).await.unwrap();

        for duplicate in [doc! { "code": 1.0 }, doc! { "code": 1_i64 }] {
            let err = store.insert_many("codes", vec![duplicate]).await.unwrap_err();
            assert!(matches!(err, StoreError::DuplicateKey { .. }), "{err:?}");
        }
        assert_eq!(store.insert_many("codes", vec![doc! { "code": 1.5 }]).await.unwrap(), 1);
        assert_eq!(store.insert_many("codes", vec![doc! { "code": "1" }]).await.unwrap(), 1);
    }

    #[test]
    fn dotted_lookup() {
        let document = doc! { "a": { "b": { "c": 3 } }, "x": 1 };
        assert_eq!(lookup(&document, "a.b.c"), Some(&Bson::Int32(3)));
        assert_eq!(lookup(&document, "x.y"), None);
        assert_eq!(lookup(&document, "missing"), None);
    }
}
