use mm_core::Entity;

use super::{length_at, require};
use crate::formats::{is_email, is_phone, is_url, present};
use crate::report::{IssueCode, ValidationReport};

/// Business listing rules. A missing profile stops validation early.
#[must_use]
pub fn validate_business(entity: &Entity) -> ValidationReport {
    let mut report = ValidationReport::new();

    require(&mut report, entity, "businessId", "Business ID is required");

    if present(entity, "profile").is_none() {
        report.error("profile", IssueCode::Required, "Business profile is required");
        return report;
    }

    if require(&mut report, entity, "profile.name", "Business name is required").is_some() {
        if let Some(len) = length_at(entity, "profile.name").filter(|n| *n < 2) {
            report.error_with(
                "profile.name",
                IssueCode::MinLength,
                "Business name must be at least 2 characters",
                len,
            );
        }
    }

    if present(entity, "profile.description").is_none() {
        report.warn(
            "profile.description",
            IssueCode::Recommended,
            "Business description is recommended",
        );
    }

    let email = require(&mut report, entity, "profile.contact.email", "Contact email is required");
    if let Some(email) = email {
        if !is_email(email) {
            report.error_with(
                "profile.contact.email",
                IssueCode::InvalidFormat,
                "Invalid email format",
                email.clone(),
            );
        }
    }

    if let Some(website) = present(entity, "profile.website").filter(|v| !is_url(v)) {
        report.error_with(
            "profile.website",
            IssueCode::InvalidFormat,
            "Invalid website URL format",
            website.clone(),
        );
    }
    if let Some(phone) = present(entity, "profile.contact.phone").filter(|v| !is_phone(v)) {
        report.warn_with(
            "profile.contact.phone",
            IssueCode::FormatWarning,
            "Phone number format may be invalid",
            phone.clone(),
        );
    }

    require(&mut report, entity, "ownerId", "Owner ID is required");

    report
}
