use mm_core::Entity;

use super::{length_at, require};
use crate::formats::{outside, present};
use crate::report::{IssueCode, ValidationReport};

const MODERATION_LEVELS: &[&str] = &["light", "moderate", "strict"];
const MEMBER_ROLES: &[&str] = &["member", "moderator", "admin"];
const MEMBER_STATUSES: &[&str] = &["active", "inactive", "banned"];

#[must_use]
pub fn validate_circle(entity: &Entity) -> ValidationReport {
    let mut report = ValidationReport::new();

    require(&mut report, entity, "circleId", "Circle ID is required");

    if require(&mut report, entity, "name", "Circle name is required").is_some() {
        match length_at(entity, "name") {
            Some(len) if len < 3 => report.error_with(
                "name",
                IssueCode::MinLength,
                "Circle name must be at least 3 characters",
                len,
            ),
            Some(len) if len > 100 => report.error_with(
                "name",
                IssueCode::MaxLength,
                "Circle name must be less than 100 characters",
                len,
            ),
            _ => {}
        }
    }

    if present(entity, "description").is_none() {
        report.warn("description", IssueCode::Recommended, "Circle description is recommended");
    } else if let Some(len) = length_at(entity, "description").filter(|n| *n > 1000) {
        report.warn_with(
            "description",
            IssueCode::LengthWarning,
            "Description is longer than recommended 1000 characters",
            len,
        );
    }

    require(&mut report, entity, "type", "Circle type is required");
    require(&mut report, entity, "createdBy", "Creator ID is required");

    if let Some(max) = present(entity, "settings.maxMembers") {
        if !max.as_f64().is_some_and(|n| (2.0..=10_000.0).contains(&n)) {
            report.error_with(
                "settings.maxMembers",
                IssueCode::RangeError,
                "Max members must be between 2 and 10000",
                max.clone(),
            );
        }
    }
    if let Some(level) = outside(entity.get_path("settings.moderationLevel"), MODERATION_LEVELS) {
        report.error_with(
            "settings.moderationLevel",
            IssueCode::InvalidValue,
            "Invalid moderation level",
            level.clone(),
        );
    }

    report
}

/// Membership rows written under a circle partition.
#[must_use]
pub fn validate_circle_member(entity: &Entity) -> ValidationReport {
    let mut report = ValidationReport::new();

    require(&mut report, entity, "circleId", "Circle ID is required");
    require(&mut report, entity, "userId", "User ID is required");

    if let Some(role) = outside(entity.get("role"), MEMBER_ROLES) {
        report.error_with("role", IssueCode::InvalidValue, "Invalid member role", role.clone());
    }
    if let Some(status) = outside(entity.get("status"), MEMBER_STATUSES) {
        report.error_with(
            "status",
            IssueCode::InvalidValue,
            "Invalid member status",
            status.clone(),
        );
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::{Value, json};

    fn circle() -> Entity {
        Entity::new()
            .with("circleId", "c-1")
            .with("name", "Sister Circle")
            .with("description", "Peer support for newly diagnosed members")
            .with("type", "support")
            .with("createdBy", "u-1")
            .with("settings", json!({"maxMembers": 50, "moderationLevel": "moderate"}))
    }

    #[test]
    fn well_formed_circle_is_clean() {
        let report = validate_circle(&circle());
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
    }

    #[rstest]
    #[case("ab", IssueCode::MinLength, "Circle name must be at least 3 characters")]
    #[case(&"n".repeat(101), IssueCode::MaxLength, "Circle name must be less than 100 characters")]
    fn name_length_bounds(#[case] name: &str, #[case] code: IssueCode, #[case] message: &str) {
        let report = validate_circle(&circle().with("name", name));
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, code);
        assert_eq!(report.errors[0].message, message);
    }

    #[rstest]
    #[case(json!(1))]
    #[case(json!(10_001))]
    #[case(json!("many"))]
    fn max_members_out_of_range(#[case] max: Value) {
        let mut entity = circle();
        entity.set_path("settings.maxMembers", max);
        let report = validate_circle(&entity);
        assert_eq!(report.messages(), vec!["Max members must be between 2 and 10000"]);
    }

    #[test]
    fn description_is_recommended() {
        let mut entity = circle();
        entity.remove("description");
        let report = validate_circle(&entity);
        assert!(report.is_valid());
        assert_eq!(report.warnings[0].code, IssueCode::Recommended);
    }

    #[test]
    fn unknown_moderation_level() {
        let mut entity = circle();
        entity.set_path("settings.moderationLevel", json!("lax"));
        assert_eq!(validate_circle(&entity).messages(), vec!["Invalid moderation level"]);
    }

    #[test]
    fn member_rows() {
        let member = Entity::new()
            .with("circleId", "c-1")
            .with("userId", "u-1")
            .with("role", "admin")
            .with("status", "active");
        assert!(validate_circle_member(&member).is_valid());

        let report = validate_circle_member(&member.with("role", "owner"));
        assert_eq!(report.messages(), vec!["Invalid member role"]);
    }
}
