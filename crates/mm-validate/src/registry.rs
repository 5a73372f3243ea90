//! Dispatch from an entity type to its rule set.

use mm_core::{Entity, EntityType};

use crate::report::ValidationReport;
use crate::rules;

/// Entity-type rules, run after the structural stages pass.
pub trait EntityValidator: Send + Sync {
    fn validate(&self, entity: &Entity) -> ValidationReport;
}

impl<F> EntityValidator for F
where
    F: Fn(&Entity) -> ValidationReport + Send + Sync,
{
    fn validate(&self, entity: &Entity) -> ValidationReport {
        self(entity)
    }
}

/// The built-in rule set for `entity_type`.
#[must_use]
pub fn validator_for(entity_type: EntityType) -> &'static dyn EntityValidator {
    match entity_type {
        EntityType::User => &rules::user::validate_user,
        EntityType::Circle => &rules::circle::validate_circle,
        EntityType::CircleMember => &rules::circle::validate_circle_member,
        EntityType::Story => &rules::story::validate_story,
        EntityType::Business => &rules::business::validate_business,
        EntityType::Resource => &rules::resource::validate_resource,
        EntityType::ImageAsset => &rules::auxiliary::validate_image_asset,
        EntityType::Feedback => &rules::auxiliary::validate_feedback,
        EntityType::Incident => &rules::auxiliary::validate_incident,
        EntityType::AdvisoryReview => &rules::auxiliary::validate_advisory_review,
        EntityType::PremiumSource => &rules::auxiliary::validate_premium_source,
        EntityType::Personalization => &rules::auxiliary::validate_personalization,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::present;
    use crate::report::IssueCode;

    #[test]
    fn every_entity_type_has_rules() {
        // An empty record fails every built-in rule set.
        for entity_type in EntityType::ALL {
            let report = validator_for(entity_type).validate(&Entity::new());
            assert!(!report.is_valid(), "{entity_type} accepted an empty record");
        }
    }

    #[test]
    fn closures_are_validators() {
        let no_tags = |entity: &Entity| {
            let mut report = ValidationReport::new();
            if present(entity, "tags").is_some() {
                report.error("tags", IssueCode::Custom, "tags are not allowed");
            }
            report
        };
        let entity = Entity::new().with("tags", "x");
        assert!(!no_tags.validate(&entity).is_valid());
        assert!(no_tags.validate(&Entity::new()).is_valid());
    }
}
