//! Shared test utilities for mm-db.

#[cfg(test)]
pub(crate) mod helpers {
    use mm_core::Entity;
    use mm_core::entity::{CREATED_AT, ENTITY_TYPE, PK, SK, UPDATED_AT, VERSION};
    use serde_json::{Value, json};

    use crate::store::{AttributeNames, AttributeValues};

    pub const T0: &str = "2024-03-01T09:00:00.000Z";

    pub fn names(pairs: &[(&str, &str)]) -> AttributeNames {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    pub fn values(pairs: &[(&str, Value)]) -> AttributeValues {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    /// A user body that passes every USER rule; the DAO stamps the rest.
    pub fn user_input(id: &str, email: &str) -> Entity {
        Entity::try_from(json!({
            "PK": format!("USER#{id}"),
            "SK": "PROFILE",
            "userId": id,
            "email": email,
            "profile": {
                "firstName": "Ada",
                "lastName": "Lovelace",
                "culturalBackground": [],
                "communicationStyle": "direct",
                "diagnosisStage": "newly_diagnosed",
                "supportNeeds": [],
                "joinDate": T0
            },
            "preferences": {
                "profileVisibility": "public",
                "showRealName": true,
                "allowDirectMessages": true,
                "shareHealthJourney": false,
                "emailNotifications": true,
                "pushNotifications": false,
                "weeklyDigest": true,
                "circleNotifications": true,
                "contentPreferences": [],
                "circleInterests": []
            },
            "settings": {
                "theme": "light",
                "language": "en",
                "timezone": "UTC",
                "accessibility": {
                    "highContrast": false,
                    "largeText": false,
                    "screenReader": false,
                    "reducedMotion": false
                }
            },
            "primaryGoals": ["connect"],
            "isVerified": false,
            "isActive": true
        }))
        .unwrap_or_default()
    }

    /// A fully stamped, valid user record, as stored.
    pub fn stored_user(id: &str, email: &str) -> Entity {
        user_input(id, email)
            .with(ENTITY_TYPE, "USER")
            .with(VERSION, 1)
            .with(CREATED_AT, T0)
            .with(UPDATED_AT, T0)
    }

    pub fn keyed(pk: &str, sk: &str) -> Entity {
        Entity::new().with(PK, pk).with(SK, sk)
    }
}
