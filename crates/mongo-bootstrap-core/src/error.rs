//! Error types for mongo-bootstrap definitions.

/// Result type for definition checks.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised when a declarative definition is malformed.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Replica set membership violates an invariant.
    #[error("invalid replica set config: {0}")]
    InvalidMembership(String),

    /// A collection schema cannot be rendered or evaluated.
    #[error("invalid schema for collection {collection}: {message}")]
    InvalidSchema {
        /// The collection the schema belongs to.
        collection: String,
        /// What is wrong with it.
        message: String,
    },

    /// An index descriptor is unusable.
    #[error("invalid index on collection {collection}: {message}")]
    InvalidIndex {
        /// The indexed collection.
        collection: String,
        /// What is wrong with it.
        message: String,
    },

    /// A seed document cannot be converted to BSON.
    #[error("invalid seed document #{position} for collection {collection}: {message}")]
    InvalidSeed {
        /// The target collection.
        collection: String,
        /// Zero-based position of the document in its batch.
        position: usize,
        /// Conversion failure.
        message: String,
    },

    /// The polling policy is unusable.
    #[error("invalid retry policy: {0}")]
    InvalidRetryPolicy(String),
}
