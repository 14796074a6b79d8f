//! Error types for provisioning.

use std::fmt;

use mongo_bootstrap_core::CoreError;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors returned by a [`crate::DocumentStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `createUser` for a name that already exists.
    #[error("user already exists: {user}@{database}")]
    UserExists {
        /// The user name.
        user: String,
        /// The database the user is defined on.
        database: String,
    },

    /// `create` for a collection that already exists.
    #[error("collection already exists: {0}")]
    CollectionExists(String),

    /// A unique index rejected a document.
    #[error("duplicate key in {collection} ({index}): {key}")]
    DuplicateKey {
        /// Target collection.
        collection: String,
        /// Violated index name.
        index: String,
        /// The duplicated key value.
        key: String,
    },

    /// A collection validator rejected a document.
    #[error("document failed validation in {collection}: {reason}")]
    ValidationFailed {
        /// Target collection.
        collection: String,
        /// Why the document was rejected.
        reason: String,
    },

    /// Connection or other server failure.
    #[error("database error: {0}")]
    Database(String),
}

/// Errors that can occur while running a provisioning plan.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// The plan is malformed; nothing was sent to the server.
    #[error("invalid provisioning plan: {0}")]
    InvalidPlan(#[from] CoreError),

    /// A step failed; the remaining steps were skipped.
    #[error("{step} failed for {target}: {source}")]
    StepFailed {
        /// The failed step.
        step: Step,
        /// User, collection or index the step was acting on.
        target: String,
        /// The store error.
        #[source]
        source: StoreError,
    },
}

impl ProvisionError {
    /// The step that failed, if the plan got as far as the server.
    #[must_use]
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::InvalidPlan(_) => None,
            Self::StepFailed { step, .. } => Some(*step),
        }
    }

    /// The underlying store error, if any.
    #[must_use]
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::InvalidPlan(_) => None,
            Self::StepFailed { source, .. } => Some(source),
        }
    }
}

/// Provisioning steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    /// Create the application user.
    CreateUser,
    /// Create a validated collection.
    CreateCollection,
    /// Build a secondary index.
    CreateIndex,
    /// Insert a seed batch.
    InsertSeeds,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CreateUser => "create user",
            Self::CreateCollection => "create collection",
            Self::CreateIndex => "create index",
            Self::InsertSeeds => "insert seeds",
        })
    }
}
