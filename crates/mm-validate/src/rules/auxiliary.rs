//! Rule sets for the image, moderation, and personalization records.

use mm_core::Entity;
use serde_json::Value;

use super::require;
use crate::formats::{is_blank, is_url, outside, present};
use crate::report::{IssueCode, ValidationReport};

const IMAGE_STATUSES: &[&str] = &["active", "archived", "flagged", "removed", "pending_review"];
const IMAGE_SCORES: &[&str] = &["culturalScore", "sensitivityScore", "inclusivityScore"];
const FEEDBACK_SEVERITIES: &[&str] = &["low", "medium", "high", "critical"];
const FEEDBACK_STATUSES: &[&str] = &["new", "acknowledged", "in_review", "resolved", "dismissed"];
const INCIDENT_TRIGGERS: &[&str] =
    &["community_report", "automated_detection", "staff", "advisory_board"];
const INCIDENT_PRIORITIES: &[&str] = &["p1", "p2", "p3"];
const REVIEW_TARGETS: &[&str] = &["image", "resource", "story"];
const REVIEW_STATUSES: &[&str] =
    &["queued", "in_review", "approved", "changes_requested", "rejected"];
const PROVIDERS: &[&str] = &["createher", "nappy", "other"];

/// Blank or not one of `allowed`. Used where absence is itself invalid.
fn missing_or_outside<'a>(value: Option<&'a Value>, allowed: &[&str]) -> Option<Option<&'a Value>> {
    match value.filter(|v| !is_blank(Some(v))) {
        None => Some(None),
        Some(v) => outside(Some(v), allowed).map(Some),
    }
}

fn error_with_optional(
    report: &mut ValidationReport,
    field: &str,
    code: IssueCode,
    message: &str,
    value: Option<&Value>,
) {
    match value {
        Some(v) => report.error_with(field, code, message, v.clone()),
        None => report.error(field, code, message),
    }
}

#[must_use]
pub fn validate_image_asset(entity: &Entity) -> ValidationReport {
    let mut report = ValidationReport::new();

    require(&mut report, entity, "imageId", "Image ID is required");
    if let Some(url) = require(&mut report, entity, "url", "Image URL is required") {
        if !is_url(url) {
            report.error_with(
                "url",
                IssueCode::InvalidFormat,
                "Invalid image URL format",
                url.clone(),
            );
        }
    }
    if let Some(thumb) = present(entity, "thumbnailUrl").filter(|v| !is_url(v)) {
        report.warn_with(
            "thumbnailUrl",
            IssueCode::FormatWarning,
            "Thumbnail URL format may be invalid",
            thumb.clone(),
        );
    }

    let alt_ok = present(entity, "altText")
        .and_then(Value::as_str)
        .is_some_and(|s| s.trim().chars().count() >= 5);
    if !alt_ok {
        report.error("altText", IssueCode::MinLength, "Alt text must be at least 5 characters");
    }

    require(&mut report, entity, "category", "Category is required");
    if let Some(status) = outside(entity.get("status"), IMAGE_STATUSES) {
        report.error_with("status", IssueCode::InvalidValue, "Invalid status", status.clone());
    }

    if present(entity, "validation").is_some() {
        for key in IMAGE_SCORES {
            let path = format!("validation.{key}");
            if let Some(score) = entity.get_path(&path) {
                if !score.as_f64().is_some_and(|n| (0.0..=1.0).contains(&n)) {
                    report.warn_with(
                        path,
                        IssueCode::RangeWarning,
                        "Score should be between 0 and 1",
                        score.clone(),
                    );
                }
            }
        }
    }

    report
}

#[must_use]
pub fn validate_feedback(entity: &Entity) -> ValidationReport {
    let mut report = ValidationReport::new();

    require(&mut report, entity, "feedbackId", "Feedback ID is required");
    require(&mut report, entity, "imageId", "Image ID is required");
    require(&mut report, entity, "userId", "User ID is required");

    match entity.get("rating") {
        None | Some(Value::Null) => {
            report.error("rating", IssueCode::Required, "Rating is required");
        }
        Some(rating) if !rating.as_f64().is_some_and(|n| (1.0..=5.0).contains(&n)) => {
            report.error_with(
                "rating",
                IssueCode::RangeError,
                "Rating must be between 1 and 5",
                rating.clone(),
            );
        }
        Some(_) => {}
    }

    if !entity.get("categories").is_some_and(Value::is_array) {
        report.warn("categories", IssueCode::TypeWarning, "Categories should be an array");
    }
    if let Some(severity) = outside(entity.get("severity"), FEEDBACK_SEVERITIES) {
        report.warn_with("severity", IssueCode::InvalidValue, "Invalid severity", severity.clone());
    }
    if let Some(status) = outside(entity.get("status"), FEEDBACK_STATUSES) {
        report.warn_with("status", IssueCode::InvalidValue, "Invalid status", status.clone());
    }

    report
}

#[must_use]
pub fn validate_incident(entity: &Entity) -> ValidationReport {
    let mut report = ValidationReport::new();

    require(&mut report, entity, "incidentId", "Incident ID is required");
    if let Some(trigger) = require(&mut report, entity, "triggeredBy", "triggeredBy is required") {
        if outside(Some(trigger), INCIDENT_TRIGGERS).is_some() {
            report.error_with(
                "triggeredBy",
                IssueCode::InvalidValue,
                "Invalid trigger",
                trigger.clone(),
            );
        }
    }
    if let Some(priority) = missing_or_outside(entity.get("priority"), INCIDENT_PRIORITIES) {
        error_with_optional(
            &mut report,
            "priority",
            IssueCode::InvalidValue,
            "Priority must be p1|p2|p3",
            priority,
        );
    }
    require(&mut report, entity, "summary", "Summary is required");

    report
}

#[must_use]
pub fn validate_advisory_review(entity: &Entity) -> ValidationReport {
    let mut report = ValidationReport::new();

    require(&mut report, entity, "reviewId", "Review ID is required");
    if let Some(target) = missing_or_outside(entity.get("targetType"), REVIEW_TARGETS) {
        error_with_optional(
            &mut report,
            "targetType",
            IssueCode::InvalidValue,
            "Invalid targetType",
            target,
        );
    }
    require(&mut report, entity, "targetId", "Target ID is required");
    if let Some(status) = outside(entity.get("status"), REVIEW_STATUSES) {
        report.warn_with("status", IssueCode::InvalidValue, "Invalid status", status.clone());
    }

    report
}

#[must_use]
pub fn validate_premium_source(entity: &Entity) -> ValidationReport {
    let mut report = ValidationReport::new();

    require(&mut report, entity, "sourceId", "Source ID is required");
    if let Some(provider) = missing_or_outside(entity.get("provider"), PROVIDERS) {
        error_with_optional(
            &mut report,
            "provider",
            IssueCode::InvalidValue,
            "Invalid provider",
            provider,
        );
    }
    require(&mut report, entity, "displayName", "Display name is required");
    if let Some(url) = present(entity, "apiBaseUrl").filter(|v| !is_url(v)) {
        report.warn_with(
            "apiBaseUrl",
            IssueCode::FormatWarning,
            "API base URL format may be invalid",
            url.clone(),
        );
    }

    report
}

#[must_use]
pub fn validate_personalization(entity: &Entity) -> ValidationReport {
    let mut report = ValidationReport::new();

    require(&mut report, entity, "userId", "User ID is required");
    if present(entity, "engagement").is_some() {
        for key in ["impressions", "clicks"] {
            let path = format!("engagement.{key}");
            if let Some(count) = entity.get_path(&path) {
                if !count.as_f64().is_some_and(|n| n >= 0.0) {
                    report.warn_with(
                        path,
                        IssueCode::RangeWarning,
                        "Engagement values must be non-negative",
                        count.clone(),
                    );
                }
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn image_asset_rules() {
        let image = Entity::new()
            .with("imageId", "img-1")
            .with("url", "https://cdn.example/1.jpg")
            .with("thumbnailUrl", "cdn.example/1-thumb.jpg")
            .with("altText", "  Hi  ")
            .with("category", "wellness")
            .with("status", "active")
            .with("validation", json!({"culturalScore": 0.9, "sensitivityScore": 1.4}));
        let report = validate_image_asset(&image);

        assert_eq!(report.messages(), vec!["Alt text must be at least 5 characters"]);
        let warned: Vec<_> = report.warnings.iter().map(|w| w.field.as_str()).collect();
        assert_eq!(warned, vec!["thumbnailUrl", "validation.sensitivityScore"]);
    }

    #[test]
    fn feedback_rating_and_soft_enums() {
        let feedback = Entity::new()
            .with("feedbackId", "f-1")
            .with("imageId", "img-1")
            .with("userId", "u-1")
            .with("rating", 7)
            .with("severity", "apocalyptic");
        let report = validate_feedback(&feedback);

        assert_eq!(report.messages(), vec!["Rating must be between 1 and 5"]);
        let codes: Vec<_> = report.warnings.iter().map(|w| w.code).collect();
        assert_eq!(codes, vec![IssueCode::TypeWarning, IssueCode::InvalidValue]);

        let report = validate_feedback(&feedback.with("rating", json!(null)));
        assert_eq!(report.messages(), vec!["Rating is required"]);
    }

    #[test]
    fn incident_priority_is_mandatory() {
        let incident = Entity::new()
            .with("incidentId", "i-1")
            .with("triggeredBy", "staff")
            .with("summary", "Flagged image");
        let report = validate_incident(&incident);
        assert_eq!(report.messages(), vec!["Priority must be p1|p2|p3"]);
        assert_eq!(report.errors[0].value, None);

        let report = validate_incident(&incident.with("priority", "p1").with("triggeredBy", "bot"));
        assert_eq!(report.messages(), vec!["Invalid trigger"]);
    }

    #[test]
    fn advisory_review_rules() {
        let review = Entity::new()
            .with("reviewId", "rv-1")
            .with("targetType", "comment")
            .with("status", "maybe");
        let report = validate_advisory_review(&review);
        assert_eq!(report.messages(), vec!["Invalid targetType", "Target ID is required"]);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn premium_source_rules() {
        let source = Entity::new()
            .with("sourceId", "ps-1")
            .with("provider", "nappy")
            .with("displayName", "Nappy")
            .with("apiBaseUrl", "api.nappy.example");
        let report = validate_premium_source(&source);
        assert!(report.is_valid());
        assert_eq!(report.warnings[0].code, IssueCode::FormatWarning);

        let report = validate_premium_source(&source.with("provider", "getty"));
        assert_eq!(report.messages(), vec!["Invalid provider"]);
    }

    #[test]
    fn personalization_engagement_warnings() {
        let profile = Entity::new()
            .with("userId", "u-1")
            .with("engagement", json!({"impressions": -3, "clicks": "many"}));
        let report = validate_personalization(&profile);
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 2);
    }
}
