use mm_core::Entity;

use super::{length_at, require};
use crate::formats::{is_url, outside, present};
use crate::report::{IssueCode, ValidationReport};

const RESOURCE_TYPES: &[&str] = &[
    "article",
    "video",
    "podcast",
    "infographic",
    "checklist",
    "guide",
    "research_paper",
    "webinar",
    "tool",
    "template",
];

#[must_use]
pub fn validate_resource(entity: &Entity) -> ValidationReport {
    let mut report = ValidationReport::new();

    require(&mut report, entity, "resourceId", "Resource ID is required");
    if require(&mut report, entity, "title", "Resource title is required").is_some() {
        if let Some(len) = length_at(entity, "title").filter(|n| *n < 5) {
            report.error_with(
                "title",
                IssueCode::MinLength,
                "Resource title must be at least 5 characters",
                len,
            );
        }
    }
    require(&mut report, entity, "description", "Resource description is required");
    if present(entity, "summary").is_none() {
        report.warn("summary", IssueCode::Recommended, "Resource summary is recommended");
    }
    require(&mut report, entity, "category", "Resource category is required");
    require(&mut report, entity, "author.id", "Author ID is required");

    if let Some(kind) = outside(entity.get("type"), RESOURCE_TYPES) {
        report.error_with("type", IssueCode::InvalidValue, "Invalid resource type", kind.clone());
    }

    for (field, message) in [
        ("externalUrl", "Invalid external URL format"),
        ("downloadUrl", "Invalid download URL format"),
    ] {
        if let Some(url) = present(entity, field).filter(|v| !is_url(v)) {
            report.error_with(field, IssueCode::InvalidFormat, message, url.clone());
        }
    }

    report
}
