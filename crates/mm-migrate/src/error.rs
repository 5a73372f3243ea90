//! Error types for mm-migrate.

use mm_db::DatabaseError;
use thiserror::Error;

use crate::result::MigrationResult;

/// Errors from a relational data source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// A query was issued before `connect()`.
    #[error("Data source is not connected")]
    NotConnected,

    /// The source rejected or could not answer a query.
    #[error("Query failed: {0}")]
    Query(String),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors that end a migration run or one entity type's migration.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration is already running")]
    AlreadyRunning,

    /// The run was cancelled; carries every result completed so far,
    /// including the partial result of the interrupted entity type.
    #[error("Migration cancelled after {} entity type(s)", results.len())]
    Cancelled { results: Vec<MigrationResult> },

    #[error("Data source not configured")]
    NoSource,

    #[error("Invalid migration config: {0}")]
    InvalidConfig(String),

    #[error("Invalid migration plan: {0}")]
    InvalidPlan(String),

    /// A pre-, post- or backup hook failed.
    #[error("Hook `{name}` failed: {message}")]
    Hook { name: String, message: String },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
