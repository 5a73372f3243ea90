//! # mm-validate
//!
//! Gatekeeping for every record before it reaches the single table.
//!
//! Validation runs in three stages, and an entity is valid only if all pass:
//! 1. [`validate_keys`]: key shape, `entityType`, `version`, timestamps
//! 2. [`validate_consistency`]: cross-field checks (`createdAt <= updatedAt`, TTL)
//! 3. Entity-type rules, dispatched through [`validator_for`]
//!
//! Errors fail validation; warnings never do. Validation is pure: the same
//! entity always yields the same report (the TTL check reads the clock).

pub mod error;
pub mod field_rule;
mod formats;
pub mod registry;
pub mod report;
pub mod rules;
pub mod structural;

pub use error::ValidationError;
pub use field_rule::{FieldKind, FieldRule, apply_rules};
pub use registry::{EntityValidator, validator_for};
pub use report::{IssueCode, ValidationIssue, ValidationReport};
pub use structural::{
    DEFAULT_MAX_BATCH_SIZE, validate_batch, validate_consistency, validate_entity,
    validate_entity_batch, validate_keys, validate_with,
};
