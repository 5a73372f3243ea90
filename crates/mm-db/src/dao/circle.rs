//! CIRCLE records and their two-sided memberships.
//!
//! A membership is two rows written together: `CIRCLE#c / MEMBER#u` in the
//! circle partition and `USER#u / CIRCLE#c` in the user partition. The
//! circle's `stats.memberCount` changes in the same transaction as the rows.

use std::sync::Arc;

use mm_core::entity::{CREATED_AT, ENTITY_TYPE, PK, UPDATED_AT, VERSION};
use mm_core::{Entity, EntityType, Gsi, ItemKey, keys, timestamps};
use mm_validate::{validate_with, validator_for};
use serde_json::{Value, json};
use tracing::info;

use super::Dao;
use super::filters::{contains_filter, eq_filter, merge_filter};
use crate::error::DatabaseError;
use crate::store::{
    AttributeNames, Condition, GetOptions, KeyValueStore, QueryOptions, QueryResult, ReturnValues,
    StoreError, TransactionItem, UpdateRequest,
};

const DEFAULT_STATUS: &str = "ACTIVE";

pub struct CircleDao<S: ?Sized> {
    dao: Dao<S>,
}

impl<S: KeyValueStore + ?Sized> CircleDao<S> {
    pub const fn new(store: Arc<S>) -> Self {
        Self {
            dao: Dao::new(store, EntityType::Circle),
        }
    }

    #[must_use]
    pub const fn dao(&self) -> &Dao<S> {
        &self.dao
    }

    /// Create a circle and enrol its creator as `admin`.
    ///
    /// Index keys come from `circleId`, `type`, `status` (default
    /// `ACTIVE`) and `tenantId`. Returns the circle as stored after the
    /// creator joined.
    ///
    /// # Errors
    ///
    /// As [`Dao::create`] and [`CircleDao::add_member`].
    pub async fn create_circle(&self, mut input: Entity) -> Result<Entity, DatabaseError> {
        let now = timestamps::now_iso();
        if input.str_attr("status").is_none() {
            input.insert("status", DEFAULT_STATUS);
        }
        let circle_id = input.str_attr("circleId").map(str::to_owned);
        let circle_type = input.str_attr("type").map(str::to_owned);
        let status = input.str_attr("status").unwrap_or(DEFAULT_STATUS).to_owned();
        let tenant = input.str_attr("tenantId").map(str::to_owned);

        if let Some(circle_id) = &circle_id {
            keys::circle_metadata(circle_id).apply(&mut input);
        }
        if let Some(circle_type) = &circle_type {
            keys::circles_by_type(circle_type, &now).apply(&mut input);
        }
        keys::IndexKey::new(
            Gsi::Gsi3,
            format!("CIRCLE_STATUS#{status}"),
            format!("UPDATED#{now}"),
        )
        .apply(&mut input);
        keys::IndexKey::new(
            Gsi::Gsi4,
            keys::tenant_partition(tenant.as_deref(), "CIRCLES"),
            format!("CREATED#{now}"),
        )
        .apply(&mut input);

        let created = self.dao.create_at(input, now).await?;
        let (Some(circle_id), Some(creator)) = (circle_id, created.str_attr("createdBy")) else {
            return Ok(created);
        };
        self.add_member(&circle_id, creator, "admin").await?;
        Ok(self.get_circle(&circle_id).await?.unwrap_or(created))
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::Store` if the read fails.
    pub async fn get_circle(&self, circle_id: &str) -> Result<Option<Entity>, DatabaseError> {
        let key = keys::circle_metadata(circle_id);
        self.dao.get_by_id(&key.pk, &key.sk, &GetOptions::default()).await
    }

    /// Write both membership rows and bump the circle's count in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// `Validation` for an unknown role, `NotFound` when the circle does not
    /// exist, `DuplicateKey` when the user is already a member.
    pub async fn add_member(
        &self,
        circle_id: &str,
        user_id: &str,
        role: &str,
    ) -> Result<(), DatabaseError> {
        let now = timestamps::now_iso();
        let member_key = keys::circle_member(circle_id, user_id);

        let mut member = Entity::new()
            .with(ENTITY_TYPE, EntityType::CircleMember.as_str())
            .with(VERSION, 1)
            .with(CREATED_AT, now.clone())
            .with(UPDATED_AT, now.clone())
            .with("circleId", circle_id)
            .with("userId", user_id)
            .with("role", role)
            .with("status", "active")
            .with("joinedAt", now.clone())
            .with("lastActive", now.clone())
            .with("contributionScore", 0)
            .with("badges", json!([]));
        let mut reverse = member.clone();
        member_key.apply(&mut member);
        keys::IndexKey::new(Gsi::Gsi3, "MEMBER_STATUS#active", format!("JOINED#{now}"))
            .apply(&mut member);
        keys::user_circle(user_id, circle_id).apply(&mut reverse);

        for row in [&member, &reverse] {
            validate_with(row, Some(validator_for(EntityType::CircleMember))).into_result()?;
        }

        let transaction = vec![
            TransactionItem::Put {
                item: member,
                condition: Some(Condition::item_absent()),
            },
            TransactionItem::Put {
                item: reverse,
                condition: Some(Condition::item_absent()),
            },
            member_count_update(circle_id, 1, now),
        ];
        match self.dao.transaction(transaction).await {
            Ok(()) => {}
            Err(DatabaseError::Store(StoreError::TransactionCanceled(_))) => {
                return Err(self.missing_circle(circle_id).await?.unwrap_or(
                    DatabaseError::DuplicateKey {
                        pk: member_key.pk,
                        sk: member_key.sk,
                    },
                ));
            }
            Err(e) => return Err(e),
        }

        info!(circle_id, user_id, role, "member added");
        Ok(())
    }

    /// Delete both membership rows and drop the circle's count in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// `NotFound` when the circle does not exist or the user is not a
    /// member.
    pub async fn remove_member(&self, circle_id: &str, user_id: &str) -> Result<(), DatabaseError> {
        let member_key = keys::circle_member(circle_id, user_id);
        let transaction = vec![
            TransactionItem::Delete {
                key: member_key.clone(),
                condition: Some(must_exist()),
            },
            TransactionItem::Delete {
                key: keys::user_circle(user_id, circle_id),
                condition: Some(must_exist()),
            },
            member_count_update(circle_id, -1, timestamps::now_iso()),
        ];
        match self.dao.transaction(transaction).await {
            Ok(()) => {}
            Err(DatabaseError::Store(StoreError::TransactionCanceled(_))) => {
                return Err(self
                    .missing_circle(circle_id)
                    .await?
                    .unwrap_or_else(|| not_found(member_key)));
            }
            Err(e) => return Err(e),
        }

        info!(circle_id, user_id, "member removed");
        Ok(())
    }

    /// The `CIRCLE#c / MEMBER#u` row, if the user belongs to the circle.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Store` if the read fails.
    pub async fn get_member(
        &self,
        circle_id: &str,
        user_id: &str,
    ) -> Result<Option<Entity>, DatabaseError> {
        let key = keys::circle_member(circle_id, user_id);
        self.dao.get_by_id(&key.pk, &key.sk, &GetOptions::default()).await
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::Store` if the read fails.
    pub async fn is_member(&self, circle_id: &str, user_id: &str) -> Result<bool, DatabaseError> {
        let key = keys::circle_member(circle_id, user_id);
        self.dao.exists(&key.pk, &key.sk).await
    }

    /// Change a member's role on both membership rows at once.
    ///
    /// # Errors
    ///
    /// `NotFound` when the user is not a member, `Validation` for an
    /// unknown role.
    pub async fn update_member_role(
        &self,
        circle_id: &str,
        user_id: &str,
        role: &str,
    ) -> Result<(), DatabaseError> {
        let member_key = keys::circle_member(circle_id, user_id);
        let Some(member) = self.get_member(circle_id, user_id).await? else {
            return Err(not_found(member_key));
        };
        let changed = member.with("role", role);
        validate_with(&changed, Some(validator_for(EntityType::CircleMember))).into_result()?;

        let now = timestamps::now_iso();
        let transaction = [member_key.clone(), keys::user_circle(user_id, circle_id)]
            .into_iter()
            .map(|key| TransactionItem::Update {
                key,
                request: role_update(role, &now),
            })
            .collect();
        match self.dao.transaction(transaction).await {
            Ok(()) => {}
            Err(DatabaseError::Store(StoreError::TransactionCanceled(_))) => {
                return Err(not_found(member_key));
            }
            Err(e) => return Err(e),
        }

        info!(circle_id, user_id, role, "member role changed");
        Ok(())
    }

    /// Member rows of a circle, ordered by user id.
    ///
    /// # Errors
    ///
    /// Same as [`Dao::query`].
    pub async fn members(
        &self,
        circle_id: &str,
        options: QueryOptions,
    ) -> Result<QueryResult, DatabaseError> {
        let pk = format!("{}{circle_id}", keys::CIRCLE_PREFIX);
        self.dao.query_prefix(&pk, keys::MEMBER_PREFIX, options).await
    }

    /// Circles of one type, oldest first.
    ///
    /// # Errors
    ///
    /// Same as [`Dao::query_gsi`].
    pub async fn circles_by_type(
        &self,
        circle_type: &str,
        options: QueryOptions,
    ) -> Result<QueryResult, DatabaseError> {
        self.dao
            .query_gsi("GSI1", &format!("CIRCLE_TYPE#{circle_type}"), None, options)
            .await
    }

    /// Circles whose status is `ACTIVE`, least recently updated first.
    ///
    /// # Errors
    ///
    /// Same as [`Dao::query_gsi`].
    pub async fn active_circles(
        &self,
        options: QueryOptions,
    ) -> Result<QueryResult, DatabaseError> {
        let pk = format!("CIRCLE_STATUS#{DEFAULT_STATUS}");
        self.dao.query_gsi("GSI3", &pk, None, options).await
    }

    /// Circles of `search.circle_type`, or every active circle, narrowed by
    /// the remaining criteria.
    ///
    /// # Errors
    ///
    /// Same as [`Dao::query_gsi`], plus `Expression` when a filter
    /// placeholder clashes with one in `options`.
    pub async fn search_circles(
        &self,
        search: &CircleSearch,
        options: QueryOptions,
    ) -> Result<QueryResult, DatabaseError> {
        let mut options = options;
        if !search.cultural_focus.is_empty() {
            let focus = string_values(&search.cultural_focus);
            options = merge_filter(options, contains_filter("settings.culturalFocus", &focus)?)?;
        }
        if !search.tags.is_empty() {
            let tags = string_values(&search.tags);
            options = merge_filter(options, contains_filter("tags", &tags)?)?;
        }
        if let Some(private) = search.is_private {
            options = merge_filter(options, eq_filter("settings.isPrivate", Value::from(private)))?;
        }
        match &search.circle_type {
            Some(circle_type) => self.circles_by_type(circle_type, options).await,
            None => self.active_circles(options).await,
        }
    }

    /// `NotFound` for the circle itself when it is gone.
    async fn missing_circle(
        &self,
        circle_id: &str,
    ) -> Result<Option<DatabaseError>, DatabaseError> {
        let key = keys::circle_metadata(circle_id);
        Ok((!self.dao.exists(&key.pk, &key.sk).await?).then(|| not_found(key)))
    }
}

/// Criteria for [`CircleDao::search_circles`]. Empty lists match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CircleSearch {
    pub circle_type: Option<String>,
    /// Any of these in `settings.culturalFocus`.
    pub cultural_focus: Vec<String>,
    /// Any of these in `tags`.
    pub tags: Vec<String>,
    pub is_private: Option<bool>,
}

fn string_values(values: &[String]) -> Vec<Value> {
    values.iter().cloned().map(Value::from).collect()
}

fn must_exist() -> Condition {
    Condition::new("attribute_exists(#pk)").name("#pk", PK)
}

fn named(pairs: &[(&str, &str)]) -> Option<AttributeNames> {
    Some(pairs.iter().map(|(p, a)| ((*p).to_string(), (*a).to_string())).collect())
}

/// Add `delta` to `stats.memberCount`, starting from zero. The circle must
/// exist.
fn member_count_update(circle_id: &str, delta: i64, now: String) -> TransactionItem {
    TransactionItem::Update {
        key: keys::circle_metadata(circle_id),
        request: UpdateRequest {
            update_expression: "SET #stats.#memberCount = \
                 if_not_exists(#stats.#memberCount, :zero) + :delta, \
                 #updatedAt = :updatedAt, #version = #version + :one"
                .into(),
            condition_expression: Some("attribute_exists(#pk)".into()),
            expression_attribute_names: named(&[
                ("#pk", PK),
                ("#stats", "stats"),
                ("#memberCount", "memberCount"),
                ("#updatedAt", UPDATED_AT),
                ("#version", VERSION),
            ]),
            expression_attribute_values: Some(
                [
                    (":zero", Value::from(0)),
                    (":delta", Value::from(delta)),
                    (":updatedAt", Value::from(now)),
                    (":one", Value::from(1)),
                ]
                .into_iter()
                .map(|(p, v)| (p.to_string(), v))
                .collect(),
            ),
            return_values: ReturnValues::None,
        },
    }
}

fn role_update(role: &str, now: &str) -> UpdateRequest {
    UpdateRequest {
        update_expression: "SET #role = :role, #updatedAt = :updatedAt, #version = #version + :one"
            .into(),
        condition_expression: Some("attribute_exists(#pk)".into()),
        expression_attribute_names: named(&[
            ("#pk", PK),
            ("#role", "role"),
            ("#updatedAt", UPDATED_AT),
            ("#version", VERSION),
        ]),
        expression_attribute_values: Some(
            [
                (":role", Value::from(role)),
                (":updatedAt", Value::from(now)),
                (":one", Value::from(1)),
            ]
            .into_iter()
            .map(|(p, v)| (p.to_string(), v))
            .collect(),
        ),
        return_values: ReturnValues::None,
    }
}

fn not_found(key: ItemKey) -> DatabaseError {
    DatabaseError::NotFound { pk: key.pk, sk: key.sk }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DeleteOptions, MemoryStore};
    use pretty_assertions::assert_eq;

    fn circles() -> (Arc<MemoryStore>, CircleDao<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Arc::clone(&store), CircleDao::new(Arc::clone(&store)))
    }

    fn circle_input(id: &str, circle_type: &str) -> Entity {
        Entity::new()
            .with("circleId", id)
            .with("name", "Morning Walkers")
            .with("description", "Gentle walks before work")
            .with("type", circle_type)
            .with("createdBy", "u1")
    }

    fn member_count(circle: &Entity) -> Option<i64> {
        circle.get_path("stats.memberCount").and_then(Value::as_i64)
    }

    #[tokio::test]
    async fn create_circle_enrols_the_creator() {
        let (store, circles) = circles();
        let circle = circles.create_circle(circle_input("c1", "SUPPORT")).await.unwrap();

        assert_eq!(circle.str_attr("status"), Some("ACTIVE"));
        assert_eq!(circle.str_attr("GSI1PK"), Some("CIRCLE_TYPE#SUPPORT"));
        assert_eq!(circle.str_attr("GSI3PK"), Some("CIRCLE_STATUS#ACTIVE"));
        assert_eq!(circle.str_attr("GSI4PK"), Some("TENANT#default#CIRCLES"));
        assert_eq!(member_count(&circle), Some(1));
        assert_eq!(circle.version(), Some(2));

        let admin = store
            .get_item(&keys::circle_member("c1", "u1"), &GetOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.str_attr("role"), Some("admin"));
        assert!(store.exists(&keys::user_circle("u1", "c1")).await.unwrap());
    }

    #[tokio::test]
    async fn membership_round_trip_tracks_count() {
        let (_, circles) = circles();
        circles.create_circle(circle_input("c1", "SUPPORT")).await.unwrap();

        circles.add_member("c1", "u2", "member").await.unwrap();
        circles.add_member("c1", "u3", "moderator").await.unwrap();
        let members = circles.members("c1", QueryOptions::default()).await.unwrap();
        assert_eq!(members.count, 3);

        circles.remove_member("c1", "u2").await.unwrap();
        let circle = circles.get_circle("c1").await.unwrap().unwrap();
        assert_eq!(member_count(&circle), Some(2));
    }

    #[tokio::test]
    async fn joining_twice_is_a_duplicate() {
        let (_, circles) = circles();
        circles.create_circle(circle_input("c1", "SUPPORT")).await.unwrap();

        let err = circles.add_member("c1", "u1", "member").await.unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateKey { .. }));
        let circle = circles.get_circle("c1").await.unwrap().unwrap();
        assert_eq!(member_count(&circle), Some(1));
    }

    #[tokio::test]
    async fn removing_a_stranger_is_not_found() {
        let (_, circles) = circles();
        circles.create_circle(circle_input("c1", "SUPPORT")).await.unwrap();
        assert!(matches!(
            circles.remove_member("c1", "nobody").await,
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_role_is_rejected_before_writing() {
        let (store, circles) = circles();
        circles.create_circle(circle_input("c1", "SUPPORT")).await.unwrap();
        let before = store.len().await;

        let err = circles.add_member("c1", "u9", "overlord").await.unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: Invalid member role");
        assert_eq!(store.len().await, before);
    }

    #[tokio::test]
    async fn circles_by_type_uses_the_type_index() {
        let (_, circles) = circles();
        circles.create_circle(circle_input("c1", "SUPPORT")).await.unwrap();
        circles.create_circle(circle_input("c2", "WELLNESS")).await.unwrap();
        circles.create_circle(circle_input("c3", "SUPPORT")).await.unwrap();

        let support = circles.circles_by_type("SUPPORT", QueryOptions::default()).await.unwrap();
        let ids: Vec<_> = support.items.iter().filter_map(|c| c.str_attr("circleId")).collect();
        assert_eq!(ids, vec!["c1", "c3"]);
    }

    fn themed(id: &str, focus: &[&str], tags: &[&str], private: bool) -> Entity {
        circle_input(id, "SUPPORT")
            .with("tags", json!(tags))
            .with("settings", json!({"culturalFocus": focus, "isPrivate": private}))
    }

    fn circle_ids(result: &QueryResult) -> Vec<&str> {
        result.items.iter().filter_map(|c| c.str_attr("circleId")).collect()
    }

    #[tokio::test]
    async fn joining_a_missing_circle_writes_nothing() {
        let (store, circles) = circles();

        let err = circles.add_member("ghost", "u1", "member").await.unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::NotFound { ref pk, ref sk } if pk == "CIRCLE#ghost" && sk == "METADATA"
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn leaving_a_missing_circle_is_not_found() {
        let (store, circles) = circles();
        circles.create_circle(circle_input("c1", "SUPPORT")).await.unwrap();
        let member = circles.get_member("c1", "u1").await.unwrap().unwrap();
        store.delete_item(&keys::circle_metadata("c1"), DeleteOptions::default()).await.unwrap();

        let err = circles.remove_member("c1", "u1").await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { ref sk, .. } if sk == "METADATA"));
        assert_eq!(circles.get_member("c1", "u1").await.unwrap(), Some(member));
    }

    #[tokio::test]
    async fn member_lookups() {
        let (_, circles) = circles();
        circles.create_circle(circle_input("c1", "SUPPORT")).await.unwrap();

        assert!(circles.is_member("c1", "u1").await.unwrap());
        assert!(!circles.is_member("c1", "u2").await.unwrap());
        assert!(circles.get_member("c1", "u2").await.unwrap().is_none());
        let admin = circles.get_member("c1", "u1").await.unwrap().unwrap();
        assert_eq!(admin.str_attr("role"), Some("admin"));
    }

    #[tokio::test]
    async fn role_change_touches_both_rows() {
        let (store, circles) = circles();
        circles.create_circle(circle_input("c1", "SUPPORT")).await.unwrap();
        circles.add_member("c1", "u2", "member").await.unwrap();

        circles.update_member_role("c1", "u2", "moderator").await.unwrap();

        let member = circles.get_member("c1", "u2").await.unwrap().unwrap();
        let reverse = store
            .get_item(&keys::user_circle("u2", "c1"), &GetOptions::default())
            .await
            .unwrap()
            .unwrap();
        for row in [&member, &reverse] {
            assert_eq!(row.str_attr("role"), Some("moderator"));
            assert_eq!(row.version(), Some(2));
        }
    }

    #[tokio::test]
    async fn role_change_rejects_strangers_and_unknown_roles() {
        let (_, circles) = circles();
        circles.create_circle(circle_input("c1", "SUPPORT")).await.unwrap();

        assert!(matches!(
            circles.update_member_role("c1", "nobody", "admin").await,
            Err(DatabaseError::NotFound { .. })
        ));
        let err = circles.update_member_role("c1", "u1", "overlord").await.unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: Invalid member role");
        let admin = circles.get_member("c1", "u1").await.unwrap().unwrap();
        assert_eq!(admin.str_attr("role"), Some("admin"));
        assert_eq!(admin.version(), Some(1));
    }

    #[tokio::test]
    async fn active_circles_skip_paused_ones() {
        let (_, circles) = circles();
        circles.create_circle(circle_input("c1", "SUPPORT")).await.unwrap();
        circles
            .create_circle(circle_input("c2", "SUPPORT").with("status", "PAUSED"))
            .await
            .unwrap();

        let active = circles.active_circles(QueryOptions::default()).await.unwrap();
        assert_eq!(circle_ids(&active), vec!["c1"]);
    }

    #[tokio::test]
    async fn search_narrows_by_focus_tags_and_privacy() {
        let (_, circles) = circles();
        circles.create_circle(themed("c1", &["caribbean"], &["walks"], false)).await.unwrap();
        circles.create_circle(themed("c2", &["west_african"], &["walks"], true)).await.unwrap();
        circles.create_circle(themed("c3", &["caribbean"], &["recipes"], false)).await.unwrap();

        let by_focus = CircleSearch {
            cultural_focus: vec!["caribbean".into(), "latina".into()],
            ..CircleSearch::default()
        };
        let found = circles.search_circles(&by_focus, QueryOptions::default()).await.unwrap();
        assert_eq!(circle_ids(&found), vec!["c1", "c3"]);

        let public_walks = CircleSearch {
            circle_type: Some("SUPPORT".into()),
            tags: vec!["walks".into()],
            is_private: Some(false),
            ..CircleSearch::default()
        };
        let found = circles.search_circles(&public_walks, QueryOptions::default()).await.unwrap();
        assert_eq!(circle_ids(&found), vec!["c1"]);

        let none = CircleSearch {
            circle_type: Some("WELLNESS".into()),
            ..CircleSearch::default()
        };
        let found = circles.search_circles(&none, QueryOptions::default()).await.unwrap();
        assert!(found.items.is_empty());
    }
}
