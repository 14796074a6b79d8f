//! Fail-fast provisioning runner.
//!
//! Steps run strictly in order: user, collections, indexes, seeds. The first failure
//! aborts the run and everything already applied stays applied.

use chrono::{DateTime, Utc};
use mongodb::bson::Document;
use mongo_bootstrap_core::{
    default_indexes, default_schemas, default_seeds, AppUser, CollectionSchema, IndexSpec,
    SeedBatch,
};
use tracing::{info, instrument};

use crate::error::{ProvisionError, Step};
use crate::DocumentStore;

/// Everything provisioning creates.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionPlan {
    /// Application user.
    pub app_user: AppUser,
    /// Collections with validators, created in order.
    pub collections: Vec<CollectionSchema>,
    /// Secondary indexes, created in order.
    pub indexes: Vec<IndexSpec>,
    /// Seed batches, inserted in order.
    pub seeds: Vec<SeedBatch>,
}

impl Default for ProvisionPlan {
    fn default() -> Self {
        Self {
            app_user: AppUser::default(),
            collections: default_schemas(),
            indexes: default_indexes(),
            seeds: default_seeds(),
        }
    }
}

impl ProvisionPlan {
    /// Check every definition and materialize the seed documents.
    ///
    /// # Errors
    ///
    /// Returns `ProvisionError::InvalidPlan` on the first malformed schema, index or seed.
    pub fn prepare(&self, now: DateTime<Utc>) -> Result<Vec<(String, Vec<Document>)>, ProvisionError> {
        for schema in &self.collections {
            schema.check_definition()?;
        }
        for index in &self.indexes {
            index.validate()?;
        }
        let mut batches = Vec::with_capacity(self.seeds.len());
        for batch in &self.seeds {
            batches.push((batch.collection.clone(), batch.materialize(now)?));
        }
        Ok(batches)
    }
}

/// What a successful run created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    /// The provisioned database.
    pub database: String,
    /// The created user.
    pub user: String,
    /// Created collections.
    pub collections: Vec<String>,
    /// Created index names, as `collection.index`.
    pub indexes: Vec<String>,
    /// Inserted document counts per seed batch.
    pub inserted: Vec<(String, usize)>,
}

impl ProvisionReport {
    /// Total seed documents inserted.
    #[must_use]
    pub fn inserted_total(&self) -> usize {
        self.inserted.iter().map(|(_, n)| n).sum()
    }
}

/// Runs a [`ProvisionPlan`] against a store.
#[derive(Debug)]
pub struct Provisioner<S> {
    store: S,
    plan: ProvisionPlan,
}

impl<S: DocumentStore> Provisioner<S> {
    /// Create a provisioner.
    #[must_use]
    pub fn new(store: S, plan: ProvisionPlan) -> Self {
        Self { store, plan }
    }

    /// The target store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The plan being run.
    pub fn plan(&self) -> &ProvisionPlan {
        &self.plan
    }

    /// Provision the database, stamping seed timestamps with `now`.
    ///
    /// The plan is checked up front; after that, nothing checks for existing state, so
    /// running twice against the same database fails at the user step.
    ///
    /// # Errors
    ///
    /// - `ProvisionError::InvalidPlan` before anything is sent to the store.
    /// - `ProvisionError::StepFailed` for the first failing step.
    #[instrument(skip_all, fields(database = %self.store.database()))]
    pub async fn run(&self, now: DateTime<Utc>) -> Result<ProvisionReport, ProvisionError> {
        let seeds = self.plan.prepare(now)?;
        let database = self.store.database().to_string();
        let mut report = ProvisionReport {
            database: database.clone(),
            ..ProvisionReport::default()
        };

        let user = &self.plan.app_user;
        self.store
            .create_user(user)
            .await
            .map_err(|source| ProvisionError::StepFailed {
                step: Step::CreateUser,
                target: user.name.clone(),
                source,
            })?;
        report.user.clone_from(&user.name);

        for schema in &self.plan.collections {
            self.store
                .create_collection(schema)
                .await
                .map_err(|source| ProvisionError::StepFailed {
                    step: Step::CreateCollection,
                    target: schema.name.clone(),
                    source,
                })?;
            report.collections.push(schema.name.clone());
        }

        for index in &self.plan.indexes {
            let name = self
                .store
                .create_index(index)
                .await
                .map_err(|source| ProvisionError::StepFailed {
                    step: Step::CreateIndex,
                    target: format!("{}.{}", index.collection, index.name()),
                    source,
                })?;
            report.indexes.push(format!("{}.{name}", index.collection));
        }

        for (collection, documents) in seeds {
            let count = self
                .store
                .insert_many(&collection, documents)
                .await
                .map_err(|source| ProvisionError::StepFailed {
                    step: Step::InsertSeeds,
                    target: collection.clone(),
                    source,
                })?;
            report.inserted.push((collection, count));
        }

        info!("✅ Database {database} provisioned successfully!");
        info!(
            "📊 Collections created: {}",
            report.collections.join(", ")
        );
        info!("👤 User created: {}", report.user);
        info!("🔍 Indexes created: {}", report.indexes.join(", "));
        info!("📝 Seed documents inserted: {}", report.inserted_total());

        Ok(report)
    }
}
