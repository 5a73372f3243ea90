//! Database error types for mm-db.

use mm_validate::ValidationError;
use thiserror::Error;

use crate::query::QueryError;
use crate::store::StoreError;

/// Errors surfaced by the DAO layer.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The record failed validation and was not written.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Update or delete against a missing key.
    #[error("Item with key PK={pk}, SK={sk} not found")]
    NotFound { pk: String, sk: String },

    /// Create against an existing key.
    #[error("Item with key PK={pk}, SK={sk} already exists")]
    DuplicateKey { pk: String, sk: String },

    /// The conditional write lost an optimistic-lock race.
    #[error("Version conflict on PK={pk}, SK={sk}: item is no longer at version {expected}")]
    Conflict { pk: String, sk: String, expected: u64 },

    /// A batch or transaction exceeded a store ceiling.
    #[error("{0}")]
    LimitExceeded(String),

    /// An index name outside `GSI1`..`GSI4`.
    #[error("Unknown GSI: {0}")]
    UnknownIndex(String),

    /// A malformed or conflicting expression.
    #[error("Invalid expression: {0}")]
    Expression(String),

    /// A query builder rejected its conditions.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// The underlying store rejected the call.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
