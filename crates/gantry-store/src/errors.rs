//! Store error type.

/// Failure in the item store or one of the repositories over it.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `SQLite` error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// A required item does not exist.
    #[error("item not found: {pk}/{sk}")]
    NotFound {
        /// Partition key.
        pk: String,
        /// Sort key.
        sk: String,
    },
    /// Persisted data failed to deserialize into its expected shape.
    #[error("corrupt item at {pk}/{sk}: {message}")]
    Corrupt {
        /// Partition key.
        pk: String,
        /// Sort key.
        sk: String,
        /// Detail.
        message: String,
    },
}
