//! Built-in rule sets, one function per entity type.
//!
//! Each function checks only the body of a record; keys and timestamps are
//! covered by [`crate::structural`].

pub mod auxiliary;
pub mod business;
pub mod circle;
pub mod resource;
pub mod story;
pub mod user;

pub use auxiliary::{
    validate_advisory_review, validate_feedback, validate_image_asset, validate_incident,
    validate_personalization, validate_premium_source,
};
pub use business::validate_business;
pub use circle::{validate_circle, validate_circle_member};
pub use resource::validate_resource;
pub use story::validate_story;
pub use user::validate_user;

use mm_core::Entity;
use serde_json::Value;

use crate::formats::{char_len, present};
use crate::report::{IssueCode, ValidationReport};

/// Record a `REQUIRED` error when `path` is blank. Returns the value otherwise.
fn require<'a>(
    report: &mut ValidationReport,
    entity: &'a Entity,
    path: &str,
    message: &str,
) -> Option<&'a Value> {
    let value = present(entity, path);
    if value.is_none() {
        report.error(path, IssueCode::Required, message);
    }
    value
}

/// Character length of a present string at `path`.
fn length_at(entity: &Entity, path: &str) -> Option<usize> {
    present(entity, path).and_then(char_len)
}
