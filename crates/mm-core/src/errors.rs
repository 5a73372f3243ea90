//! Cross-cutting error types for MADMall.
//!
//! Domain-specific errors (`DatabaseError`, `MigrationError`) are defined in
//! their respective crates. The `mmctl` binary converges them through `anyhow`.

use thiserror::Error;

/// Errors that can be raised by any MADMall crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An `entityType` discriminator that no entity type maps to.
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    /// A secondary index name outside `GSI1`..`GSI4`.
    #[error("Unknown index: {0}")]
    UnknownIndex(String),

    /// Data failed a structural check (not an object, bad key shape).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
