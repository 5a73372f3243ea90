//! Key patterns for every MADMall access pattern.
//!
//! Base-table keys are `ItemKey`s; secondary-index keys are `IndexKey`s that
//! know which `GSI{n}PK`/`GSI{n}SK` pair they populate.

use crate::entity::{Entity, ItemKey};
use crate::enums::Gsi;

pub const USER_PREFIX: &str = "USER#";
pub const CIRCLE_PREFIX: &str = "CIRCLE#";
pub const MEMBER_PREFIX: &str = "MEMBER#";
pub const STORY_PREFIX: &str = "STORY#";
pub const BUSINESS_PREFIX: &str = "BUSINESS#";
pub const RESOURCE_PREFIX: &str = "RESOURCE#";
pub const IMAGE_PREFIX: &str = "IMAGE#";
pub const FEEDBACK_PREFIX: &str = "FEEDBACK#";
pub const INCIDENT_PREFIX: &str = "INCIDENT#";
pub const REVIEW_PREFIX: &str = "REVIEW#";
pub const PREMIUM_SOURCE_PREFIX: &str = "PREMIUM_SOURCE#";

pub const PROFILE_SK: &str = "PROFILE";
pub const METADATA_SK: &str = "METADATA";
pub const PERSONALIZATION_SK: &str = "PERSONALIZATION";
pub const STORY_FEED_PK: &str = "STORY_FEED";
pub const DEFAULT_TENANT: &str = "default";

/// Key pair of one secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
    pub index: Gsi,
    pub pk: String,
    pub sk: String,
}

impl IndexKey {
    pub fn new(index: Gsi, pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            index,
            pk: pk.into(),
            sk: sk.into(),
        }
    }

    /// Write `GSI{n}PK`/`GSI{n}SK` onto an entity.
    pub fn apply(&self, entity: &mut Entity) {
        entity.insert(self.index.partition_key(), self.pk.clone());
        entity.insert(self.index.sort_key(), self.sk.clone());
    }
}

// --- Users ---

#[must_use]
pub fn user_profile(user_id: &str) -> ItemKey {
    ItemKey::new(format!("{USER_PREFIX}{user_id}"), PROFILE_SK)
}

#[must_use]
pub fn user_by_email(email: &str, user_id: &str) -> IndexKey {
    IndexKey::new(Gsi::Gsi1, format!("EMAIL#{email}"), format!("{USER_PREFIX}{user_id}"))
}

#[must_use]
pub fn tenant_users(tenant: Option<&str>, created_at: &str) -> IndexKey {
    IndexKey::new(
        Gsi::Gsi4,
        tenant_partition(tenant, "USERS"),
        format!("CREATED#{created_at}"),
    )
}

/// `TENANT#{tenant}#{collection}`, with `default` for a missing tenant.
#[must_use]
pub fn tenant_partition(tenant: Option<&str>, collection: &str) -> String {
    let tenant = tenant.filter(|t| !t.is_empty()).unwrap_or(DEFAULT_TENANT);
    format!("TENANT#{tenant}#{collection}")
}

#[must_use]
pub fn personalization(user_id: &str) -> ItemKey {
    ItemKey::new(format!("{USER_PREFIX}{user_id}"), PERSONALIZATION_SK)
}

// --- Circles ---

#[must_use]
pub fn circle_metadata(circle_id: &str) -> ItemKey {
    ItemKey::new(format!("{CIRCLE_PREFIX}{circle_id}"), METADATA_SK)
}

#[must_use]
pub fn circle_member(circle_id: &str, user_id: &str) -> ItemKey {
    ItemKey::new(
        format!("{CIRCLE_PREFIX}{circle_id}"),
        format!("{MEMBER_PREFIX}{user_id}"),
    )
}

/// Reverse edge of a membership, stored in the user's partition.
#[must_use]
pub fn user_circle(user_id: &str, circle_id: &str) -> ItemKey {
    ItemKey::new(
        format!("{USER_PREFIX}{user_id}"),
        format!("{CIRCLE_PREFIX}{circle_id}"),
    )
}

#[must_use]
pub fn circles_by_type(circle_type: &str, created_at: &str) -> IndexKey {
    IndexKey::new(
        Gsi::Gsi1,
        format!("CIRCLE_TYPE#{circle_type}"),
        format!("CREATED#{created_at}"),
    )
}

// --- Content ---

#[must_use]
pub fn story(story_id: &str) -> ItemKey {
    ItemKey::new(format!("{STORY_PREFIX}{story_id}"), METADATA_SK)
}

#[must_use]
pub fn story_feed(created_at: &str) -> IndexKey {
    IndexKey::new(Gsi::Gsi2, STORY_FEED_PK, format!("CREATED#{created_at}"))
}

#[must_use]
pub fn business(business_id: &str) -> ItemKey {
    ItemKey::new(format!("{BUSINESS_PREFIX}{business_id}"), METADATA_SK)
}

#[must_use]
pub fn resource(resource_id: &str) -> ItemKey {
    ItemKey::new(format!("{RESOURCE_PREFIX}{resource_id}"), METADATA_SK)
}

#[must_use]
pub fn image_asset(image_id: &str) -> ItemKey {
    ItemKey::new(format!("{IMAGE_PREFIX}{image_id}"), METADATA_SK)
}

#[must_use]
pub fn feedback(feedback_id: &str) -> ItemKey {
    ItemKey::new(format!("{FEEDBACK_PREFIX}{feedback_id}"), METADATA_SK)
}

#[must_use]
pub fn incident(incident_id: &str) -> ItemKey {
    ItemKey::new(format!("{INCIDENT_PREFIX}{incident_id}"), METADATA_SK)
}

#[must_use]
pub fn advisory_review(review_id: &str) -> ItemKey {
    ItemKey::new(format!("{REVIEW_PREFIX}{review_id}"), METADATA_SK)
}

#[must_use]
pub fn premium_source(source_id: &str) -> ItemKey {
    ItemKey::new(format!("{PREMIUM_SOURCE_PREFIX}{source_id}"), METADATA_SK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn user_keys() {
        assert_eq!(user_profile("u1"), ItemKey::new("USER#u1", "PROFILE"));
        assert_eq!(
            user_by_email("a@b.co", "u1"),
            IndexKey::new(Gsi::Gsi1, "EMAIL#a@b.co", "USER#u1")
        );
        assert_eq!(tenant_users(None, "t").pk, "TENANT#default#USERS");
        assert_eq!(tenant_users(Some(""), "t").pk, "TENANT#default#USERS");
        assert_eq!(tenant_users(Some("acme"), "t").pk, "TENANT#acme#USERS");
    }

    #[test]
    fn membership_edges_mirror_each_other() {
        let member = circle_member("c1", "u1");
        let edge = user_circle("u1", "c1");
        assert_eq!(member, ItemKey::new("CIRCLE#c1", "MEMBER#u1"));
        assert_eq!(edge, ItemKey::new("USER#u1", "CIRCLE#c1"));
    }

    #[test]
    fn index_key_applies_fixed_attribute_names() {
        let mut entity = Entity::new();
        story("s1").apply(&mut entity);
        story_feed("2024-01-01T00:00:00.000Z").apply(&mut entity);

        assert_eq!(
            serde_json::Value::from(entity),
            json!({
                "PK": "STORY#s1",
                "SK": "METADATA",
                "GSI2PK": "STORY_FEED",
                "GSI2SK": "CREATED#2024-01-01T00:00:00.000Z",
            })
        );
    }
}
