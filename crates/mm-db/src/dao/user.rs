//! USER records: profile rows plus the email and tenant indexes.

use std::sync::Arc;

use mm_core::entity::{PK, UPDATED_AT, VERSION};
use mm_core::{Entity, EntityType, ItemKey, keys, timestamps};
use serde_json::Value;
use tracing::debug;

use super::Dao;
use super::filters::{contains_filter, eq_filter, merge_filter};
use crate::error::DatabaseError;
use crate::store::{
    GetOptions, KeyValueStore, QueryOptions, QueryResult, ReturnValues, StoreError, UpdateRequest,
};

pub struct UserDao<S: ?Sized> {
    dao: Dao<S>,
}

impl<S: KeyValueStore + ?Sized> UserDao<S> {
    pub const fn new(store: Arc<S>) -> Self {
        Self {
            dao: Dao::new(store, EntityType::User),
        }
    }

    /// The generic DAO underneath, for updates and deletes.
    #[must_use]
    pub const fn dao(&self) -> &Dao<S> {
        &self.dao
    }

    /// Create a user from `input`, deriving its keys from `userId`,
    /// `email`, and the optional `tenantId`.
    ///
    /// # Errors
    ///
    /// `DuplicateKey` when the email or the user id is taken, otherwise as
    /// [`Dao::create`].
    pub async fn create_user(&self, mut input: Entity) -> Result<Entity, DatabaseError> {
        let now = timestamps::now_iso();
        let user_id = input.str_attr("userId").map(str::to_owned);
        let email = input.str_attr("email").map(str::to_owned);
        let tenant = input.str_attr("tenantId").map(str::to_owned);

        if let Some(user_id) = &user_id {
            keys::user_profile(user_id).apply(&mut input);
            keys::tenant_users(tenant.as_deref(), &now).apply(&mut input);
            if let Some(email) = &email {
                keys::user_by_email(email, user_id).apply(&mut input);
            }
        }

        if let Some(email) = &email {
            if let Some(existing) = self.get_by_email(email).await? {
                return Err(DatabaseError::DuplicateKey {
                    pk: format!("EMAIL#{email}"),
                    sk: existing.pk().unwrap_or_default().to_string(),
                });
            }
        }
        self.dao.create_at(input, now).await
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::Store` if the read fails.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<Entity>, DatabaseError> {
        let key = keys::user_profile(user_id);
        self.dao.get_by_id(&key.pk, &key.sk, &GetOptions::default()).await
    }

    /// First user indexed under `email`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Store` if the query fails.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<Entity>, DatabaseError> {
        let options = QueryOptions {
            limit: Some(1),
            ..QueryOptions::default()
        };
        let result = self
            .dao
            .query_gsi("GSI1", &format!("EMAIL#{email}"), None, options)
            .await?;
        Ok(result.items.into_iter().next())
    }

    /// Circle memberships kept in the user's own partition.
    ///
    /// # Errors
    ///
    /// Same as [`Dao::query`].
    pub async fn user_circles(
        &self,
        user_id: &str,
        options: QueryOptions,
    ) -> Result<QueryResult, DatabaseError> {
        let pk = format!("{}{user_id}", keys::USER_PREFIX);
        self.dao.query_prefix(&pk, keys::CIRCLE_PREFIX, options).await
    }

    /// Users of `tenant` (or the default tenant), oldest first.
    ///
    /// # Errors
    ///
    /// Same as [`Dao::query_gsi`].
    pub async fn users_by_tenant(
        &self,
        tenant: Option<&str>,
        options: QueryOptions,
    ) -> Result<QueryResult, DatabaseError> {
        let pk = keys::tenant_partition(tenant, "USERS");
        self.dao.query_gsi("GSI4", &pk, None, options).await
    }

    /// Users of `tenant` matching every criterion of `search`.
    ///
    /// # Errors
    ///
    /// Same as [`Dao::query_gsi`], plus `Expression` when a filter
    /// placeholder clashes with one in `options`.
    pub async fn search_users(
        &self,
        tenant: Option<&str>,
        search: &UserSearch,
        options: QueryOptions,
    ) -> Result<QueryResult, DatabaseError> {
        let mut options = options;
        let lists = [
            ("profile.culturalBackground", &search.cultural_background),
            ("profile.supportNeeds", &search.support_needs),
        ];
        for (attribute, wanted) in lists {
            if !wanted.is_empty() {
                let wanted: Vec<Value> = wanted.iter().cloned().map(Value::from).collect();
                options = merge_filter(options, contains_filter(attribute, &wanted)?)?;
            }
        }
        let exact = [
            ("profile.diagnosisStage", &search.diagnosis_stage),
            ("profile.location.city", &search.city),
            ("profile.location.state", &search.state),
            ("profile.location.country", &search.country),
        ];
        for (attribute, wanted) in exact {
            if let Some(wanted) = wanted {
                let filter = eq_filter(attribute, Value::from(wanted.as_str()));
                options = merge_filter(options, filter)?;
            }
        }
        self.users_by_tenant(tenant, options).await
    }

    /// Stamp `profile.lastActive` and bump the version.
    ///
    /// # Errors
    ///
    /// `NotFound` when the user does not exist.
    pub async fn touch_last_active(&self, user_id: &str) -> Result<(), DatabaseError> {
        let key = keys::user_profile(user_id);
        let now = timestamps::now_iso();
        let request = UpdateRequest {
            update_expression:
                "SET #profile.#lastActive = :now, #updatedAt = :now, #version = #version + :one"
                    .into(),
            condition_expression: Some("attribute_exists(#pk)".into()),
            expression_attribute_names: Some(
                [
                    ("#pk", PK),
                    ("#profile", "profile"),
                    ("#lastActive", "lastActive"),
                    ("#updatedAt", UPDATED_AT),
                    ("#version", VERSION),
                ]
                .into_iter()
                .map(|(p, a)| (p.to_string(), a.to_string()))
                .collect(),
            ),
            expression_attribute_values: Some(
                [
                    (":now".to_string(), Value::from(now)),
                    (":one".to_string(), Value::from(1)),
                ]
                .into(),
            ),
            return_values: ReturnValues::None,
        };

        match self.dao.store().update_item(&key, request).await {
            Ok(_) => {
                debug!(user_id, "touched last active");
                Ok(())
            }
            Err(StoreError::ConditionalCheckFailed { .. }) => Err(not_found(key)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Criteria for [`UserDao::search_users`]. Unset criteria match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSearch {
    /// Any of these in `profile.culturalBackground`.
    pub cultural_background: Vec<String>,
    pub diagnosis_stage: Option<String>,
    /// Any of these in `profile.supportNeeds`.
    pub support_needs: Vec<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

fn not_found(key: ItemKey) -> DatabaseError {
    DatabaseError::NotFound { pk: key.pk, sk: key.sk }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_support::helpers::user_input;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn users() -> (Arc<MemoryStore>, UserDao<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Arc::clone(&store), UserDao::new(Arc::clone(&store)))
    }

    fn input(id: &str, email: &str) -> Entity {
        let mut input = user_input(id, email);
        input.remove(PK);
        input.remove("SK");
        input
    }

    #[tokio::test]
    async fn create_user_derives_every_key() {
        let (_, users) = users();
        let created = users
            .create_user(input("u1", "ada@example.com").with("tenantId", "acme"))
            .await
            .unwrap();

        assert_eq!(created.pk(), Some("USER#u1"));
        assert_eq!(created.sk(), Some("PROFILE"));
        assert_eq!(created.get("GSI1PK"), Some(&json!("EMAIL#ada@example.com")));
        assert_eq!(created.get("GSI1SK"), Some(&json!("USER#u1")));
        assert_eq!(created.get("GSI4PK"), Some(&json!("TENANT#acme#USERS")));
        assert_eq!(
            created.str_attr("GSI4SK").map(str::to_owned),
            created.created_at().map(|t| format!("CREATED#{t}"))
        );
    }

    #[tokio::test]
    async fn lookups_by_id_email_and_tenant() {
        let (_, users) = users();
        users.create_user(input("u1", "ada@example.com")).await.unwrap();
        users.create_user(input("u2", "grace@example.com")).await.unwrap();

        assert!(users.get_user("u1").await.unwrap().is_some());
        assert!(users.get_user("nobody").await.unwrap().is_none());
        let found = users.get_by_email("grace@example.com").await.unwrap().unwrap();
        assert_eq!(found.str_attr("userId"), Some("u2"));

        let tenant = users.users_by_tenant(None, QueryOptions::default()).await.unwrap();
        assert_eq!(tenant.count, 2);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let (store, users) = users();
        users.create_user(input("u1", "ada@example.com")).await.unwrap();

        let err = users.create_user(input("u2", "ada@example.com")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateKey { .. }));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn touch_last_active_bumps_version() {
        let (_, users) = users();
        users.create_user(input("u1", "ada@example.com")).await.unwrap();

        users.touch_last_active("u1").await.unwrap();
        let user = users.get_user("u1").await.unwrap().unwrap();
        assert_eq!(user.version(), Some(2));
        assert_eq!(user.get_path("profile.lastActive"), user.get(UPDATED_AT));

        assert!(matches!(
            users.touch_last_active("ghost").await,
            Err(DatabaseError::NotFound { .. })
        ));
    }

    fn profiled(id: &str, background: &[&str], stage: &str, city: &str) -> Entity {
        let mut user = input(id, &format!("{id}@example.com"));
        user.set_path("profile.culturalBackground", json!(background));
        user.set_path("profile.diagnosisStage", json!(stage));
        user.set_path("profile.location", json!({"city": city, "state": "GA", "country": "US"}));
        user
    }

    fn user_ids(result: &QueryResult) -> Vec<&str> {
        result.items.iter().filter_map(|u| u.str_attr("userId")).collect()
    }

    #[tokio::test]
    async fn search_users_combines_criteria() {
        let (_, users) = users();
        for user in [
            profiled("u1", &["caribbean"], "newly_diagnosed", "Atlanta"),
            profiled("u2", &["west_african"], "in_treatment", "Atlanta"),
            profiled("u3", &["caribbean", "latina"], "in_treatment", "Savannah"),
        ] {
            users.create_user(user).await.unwrap();
        }

        let caribbean = UserSearch {
            cultural_background: vec!["caribbean".into()],
            ..UserSearch::default()
        };
        let all = QueryOptions::default;
        let found = users.search_users(None, &caribbean, all()).await.unwrap();
        assert_eq!(user_ids(&found), vec!["u1", "u3"]);

        let treated_in_atlanta = UserSearch {
            diagnosis_stage: Some("in_treatment".into()),
            city: Some("Atlanta".into()),
            country: Some("US".into()),
            ..UserSearch::default()
        };
        let found = users.search_users(None, &treated_in_atlanta, all()).await.unwrap();
        assert_eq!(user_ids(&found), vec!["u2"]);

        let everyone = users.search_users(None, &UserSearch::default(), all()).await.unwrap();
        assert_eq!(everyone.count, 3);
        let elsewhere = users.search_users(Some("acme"), &caribbean, all()).await.unwrap();
        assert!(elsewhere.items.is_empty());
    }
}
