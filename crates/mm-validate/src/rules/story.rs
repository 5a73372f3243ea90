use mm_core::Entity;

use super::{length_at, require};
use crate::formats::outside;
use crate::report::{IssueCode, ValidationReport};

const STORY_TYPES: &[&str] = &[
    "personal_experience",
    "milestone_celebration",
    "challenge_overcome",
    "advice_sharing",
    "gratitude_expression",
    "awareness_raising",
];
const STORY_STATUSES: &[&str] = &["draft", "published", "archived", "flagged", "removed"];

#[must_use]
pub fn validate_story(entity: &Entity) -> ValidationReport {
    let mut report = ValidationReport::new();

    require(&mut report, entity, "storyId", "Story ID is required");

    if require(&mut report, entity, "title", "Story title is required").is_some() {
        match length_at(entity, "title") {
            Some(len) if len < 5 => report.error_with(
                "title",
                IssueCode::MinLength,
                "Story title must be at least 5 characters",
                len,
            ),
            Some(len) if len > 200 => report.error_with(
                "title",
                IssueCode::MaxLength,
                "Story title must be less than 200 characters",
                len,
            ),
            _ => {}
        }
    }

    if require(&mut report, entity, "content", "Story content is required").is_some() {
        match length_at(entity, "content") {
            Some(len) if len < 50 => {
                report.warn_with(
                    "content",
                    IssueCode::LengthWarning,
                    "Story content is quite short",
                    len,
                );
            }
            Some(len) if len > 50_000 => {
                report.warn_with(
                    "content",
                    IssueCode::LengthWarning,
                    "Story content is very long",
                    len,
                );
            }
            _ => {}
        }
    }

    require(&mut report, entity, "author.id", "Author ID is required");

    if let Some(kind) = outside(entity.get("type"), STORY_TYPES) {
        report.error_with("type", IssueCode::InvalidValue, "Invalid story type", kind.clone());
    }
    if let Some(status) = outside(entity.get("status"), STORY_STATUSES) {
        report.error_with(
            "status",
            IssueCode::InvalidValue,
            "Invalid story status",
            status.clone(),
        );
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn story() -> Entity {
        Entity::new()
            .with("storyId", "s-1")
            .with("title", "Finding my people")
            .with("content", "c".repeat(120))
            .with("author", json!({"id": "u-1", "displayName": "Ada"}))
            .with("type", "personal_experience")
            .with("status", "published")
    }

    #[test]
    fn well_formed_story_is_clean() {
        let report = validate_story(&story());
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn short_content_warns_without_failing() {
        let report = validate_story(&story().with("content", "Too short."));
        assert!(report.is_valid());
        assert_eq!(report.warnings[0].message, "Story content is quite short");
        assert_eq!(report.warnings[0].value, Some(json!(10)));
    }

    #[test]
    fn missing_author_and_bad_enums() {
        let mut entity = story().with("type", "rant").with("status", "pending");
        entity.remove("author");
        let report = validate_story(&entity);
        assert_eq!(
            report.messages(),
            vec!["Author ID is required", "Invalid story type", "Invalid story status"]
        );
    }

    #[test]
    fn title_bounds() {
        let report = validate_story(&story().with("title", "Hey"));
        assert_eq!(report.messages(), vec!["Story title must be at least 5 characters"]);
        assert_eq!(report.errors[0].value, Some(json!(3)));
    }
}
