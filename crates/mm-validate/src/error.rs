//! Validation error types.

use thiserror::Error;

/// A report with at least one error, converted into a failure.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// One or more error-level issues. Messages keep report order.
    #[error("Validation failed: {}", messages.join(", "))]
    Failed { messages: Vec<String> },
}
