use mm_core::Entity;

use super::{length_at, require};
use crate::formats::{is_email, outside, present};
use crate::report::{IssueCode, ValidationReport};

const THEMES: &[&str] = &["light", "dark", "auto"];
const BIO_RECOMMENDED_MAX: usize = 500;

#[must_use]
pub fn validate_user(entity: &Entity) -> ValidationReport {
    let mut report = ValidationReport::new();

    require(&mut report, entity, "userId", "User ID is required");
    if let Some(email) = require(&mut report, entity, "email", "Email is required") {
        if !is_email(email) {
            report.error_with(
                "email",
                IssueCode::InvalidFormat,
                "Invalid email format",
                email.clone(),
            );
        }
    }

    if present(entity, "profile").is_some() {
        require(&mut report, entity, "profile.firstName", "First name is required");
        require(&mut report, entity, "profile.lastName", "Last name is required");

        if let Some(len) = length_at(entity, "profile.bio").filter(|n| *n > BIO_RECOMMENDED_MAX) {
            report.warn_with(
                "profile.bio",
                IssueCode::LengthWarning,
                "Bio is longer than recommended 500 characters",
                len,
            );
        }
        if !present(entity, "profile.culturalBackground").is_some_and(|v| v.is_array()) {
            report.warn(
                "profile.culturalBackground",
                IssueCode::TypeWarning,
                "Cultural background should be an array",
            );
        }
    } else {
        report.error("profile", IssueCode::Required, "Profile is required");
    }

    if let Some(theme) = outside(entity.get_path("settings.theme"), THEMES) {
        report.error_with(
            "settings.theme",
            IssueCode::InvalidValue,
            "Invalid theme value",
            theme.clone(),
        );
    }

    report
}
