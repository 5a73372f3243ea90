//! The generic entity DAO and its typed wrappers.
//!
//! Every write goes through [`Dao`], which stamps system attributes,
//! validates, and guards updates with the item's `version`.

pub mod circle;
pub mod filters;
pub mod user;

use std::sync::Arc;

use mm_core::entity::{CREATED_AT, ENTITY_TYPE, PK, SK, SYSTEM_ATTRIBUTES, UPDATED_AT, VERSION};
use mm_core::{Entity, EntityType, Gsi, ItemKey, WriteKind, timestamps};
use mm_validate::{EntityValidator, validate_with, validator_for};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::query::{QueryBuilder, QueryParams};
use crate::store::{
    AttributeNames, AttributeValues, Condition, DeleteOptions, GetOptions, KeyValueStore,
    MAX_BATCH_GET, MAX_BATCH_WRITE, MAX_TRANSACTION_ITEMS, QueryOptions, QueryResult,
    ReturnValues, StoreError, TransactionItem, UpdateRequest,
};

pub use circle::{CircleDao, CircleSearch};
pub use filters::{contains_filter, eq_filter, in_filter, merge_filter};
pub use user::{UserDao, UserSearch};

/// Caller extras for [`Dao::update`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOptions {
    /// ANDed with the version guard, never replacing it.
    pub condition: Option<String>,
    pub names: Option<AttributeNames>,
    pub values: Option<AttributeValues>,
    /// `ALL_NEW` when unset.
    pub return_values: Option<ReturnValues>,
    /// Guard on this version instead of the one just read.
    pub expected_version: Option<u64>,
}

/// Data access for one entity type over a [`KeyValueStore`].
pub struct Dao<S: ?Sized> {
    store: Arc<S>,
    entity_type: EntityType,
    validator: Option<Arc<dyn EntityValidator>>,
}

impl<S: ?Sized> Clone for Dao<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            entity_type: self.entity_type,
            validator: self.validator.clone(),
        }
    }
}

impl<S: KeyValueStore + ?Sized> Dao<S> {
    pub const fn new(store: Arc<S>, entity_type: EntityType) -> Self {
        Self {
            store,
            entity_type,
            validator: None,
        }
    }

    /// Replace the built-in rules of the entity type.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn EntityValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    #[must_use]
    pub const fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn rules(&self) -> &dyn EntityValidator {
        self.validator
            .as_deref()
            .unwrap_or_else(|| validator_for(self.entity_type))
    }

    fn validate(&self, entity: &Entity) -> Result<(), DatabaseError> {
        validate_with(entity, Some(self.rules())).into_result()?;
        Ok(())
    }

    // --- Single items ---

    /// Stamp, validate, and insert a new item.
    ///
    /// # Errors
    ///
    /// `Validation` for an invalid item, `DuplicateKey` when the key is
    /// taken, `Store` for store failures.
    pub async fn create(&self, item: Entity) -> Result<Entity, DatabaseError> {
        self.create_at(item, timestamps::now_iso()).await
    }

    /// [`Dao::create`] with a caller-chosen timestamp, for typed DAOs that
    /// derive index keys from it.
    pub(crate) async fn create_at(
        &self,
        mut item: Entity,
        now: String,
    ) -> Result<Entity, DatabaseError> {
        item.insert(ENTITY_TYPE, self.entity_type.as_str());
        item.insert(VERSION, 1);
        item.insert(CREATED_AT, now.clone());
        item.insert(UPDATED_AT, now);

        self.validate(&item)?;
        let key = item.key().ok_or(StoreError::MissingKey)?;

        if self.store.exists(&key).await? {
            return Err(duplicate(&key));
        }
        match self.store.put_item(item.clone(), Some(Condition::item_absent())).await {
            Ok(()) => {}
            Err(StoreError::ConditionalCheckFailed { .. }) => return Err(duplicate(&key)),
            Err(e) => return Err(e.into()),
        }

        info!(entity_type = %self.entity_type, pk = %key.pk, sk = %key.sk, "created item");
        Ok(item)
    }

    /// Plain read; `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Store` if the read fails.
    pub async fn get_by_id(
        &self,
        pk: &str,
        sk: &str,
        options: &GetOptions,
    ) -> Result<Option<Entity>, DatabaseError> {
        Ok(self.store.get_item(&ItemKey::new(pk, sk), options).await?)
    }

    /// Apply `updates` under the optimistic-lock guard.
    ///
    /// System attributes in `updates` are ignored. Returns the image
    /// selected by `return_values` (`ALL_NEW` by default), validated when
    /// it is the full new item.
    ///
    /// # Errors
    ///
    /// `NotFound` when the item is absent, `Conflict` when another writer
    /// moved the version, `Expression` on a caller placeholder clash,
    /// `Validation` when the new image is invalid.
    pub async fn update(
        &self,
        pk: &str,
        sk: &str,
        updates: Entity,
        options: UpdateOptions,
    ) -> Result<Option<Entity>, DatabaseError> {
        let key = ItemKey::new(pk, sk);
        let current = self
            .store
            .get_item(&key, &GetOptions::default())
            .await?
            .ok_or_else(|| not_found(&key))?;

        let current_version = current.version().unwrap_or(0);
        let observed = options.expected_version.unwrap_or(current_version);

        let mut names = AttributeNames::from([
            ("#updatedAt".to_string(), UPDATED_AT.to_string()),
            ("#version".to_string(), VERSION.to_string()),
        ]);
        let mut values = AttributeValues::from([
            (":updatedAt".to_string(), Value::from(timestamps::now_iso())),
            (":version".to_string(), Value::from(current_version + 1)),
            (":currentVersion".to_string(), Value::from(observed)),
        ]);
        let mut assignments = vec![
            "#updatedAt = :updatedAt".to_string(),
            "#version = :version".to_string(),
        ];
        let writable = updates
            .into_map()
            .into_iter()
            .filter(|(attr, _)| !SYSTEM_ATTRIBUTES.contains(&attr.as_str()));
        for (index, (attr, value)) in writable.enumerate() {
            names.insert(format!("#attr{index}"), attr);
            values.insert(format!(":val{index}"), value);
            assignments.push(format!("#attr{index} = :val{index}"));
        }

        let guard = "#version = :currentVersion";
        let condition = match &options.condition {
            Some(caller) => format!("({caller}) AND ({guard})"),
            None => guard.to_string(),
        };
        let mut names = Some(names);
        let mut values = Some(values);
        filters::merge_bindings(&mut names, options.names)?;
        filters::merge_bindings(&mut values, options.values)?;

        let return_values = options.return_values.unwrap_or(ReturnValues::AllNew);
        let request = UpdateRequest {
            update_expression: format!("SET {}", assignments.join(", ")),
            condition_expression: Some(condition),
            expression_attribute_names: names,
            expression_attribute_values: values,
            return_values,
        };

        let image = match self.store.update_item(&key, request).await {
            Ok(image) => image,
            Err(StoreError::ConditionalCheckFailed { .. }) => {
                debug!(pk, sk, expected = observed, "update lost the version race");
                return Err(DatabaseError::Conflict {
                    pk: key.pk,
                    sk: key.sk,
                    expected: observed,
                });
            }
            Err(e) => return Err(e.into()),
        };

        if return_values == ReturnValues::AllNew {
            if let Some(updated) = &image {
                self.validate(updated)?;
            }
        }
        debug!(pk, sk, version = current_version + 1, "updated item");
        Ok(image)
    }

    /// Delete an existing item.
    ///
    /// # Errors
    ///
    /// `NotFound` when the item is absent.
    pub async fn delete(
        &self,
        pk: &str,
        sk: &str,
        options: DeleteOptions,
    ) -> Result<(), DatabaseError> {
        let key = ItemKey::new(pk, sk);
        if !self.store.exists(&key).await? {
            return Err(not_found(&key));
        }
        self.store.delete_item(&key, options).await?;
        info!(entity_type = %self.entity_type, pk, sk, "deleted item");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::Store` if the check fails.
    pub async fn exists(&self, pk: &str, sk: &str) -> Result<bool, DatabaseError> {
        Ok(self.store.exists(&ItemKey::new(pk, sk)).await?)
    }

    // --- Queries ---

    /// Items of the base-table partition `pk`.
    ///
    /// # Errors
    ///
    /// `Expression` when caller placeholders clash with generated ones.
    pub async fn query(
        &self,
        pk: &str,
        options: QueryOptions,
    ) -> Result<QueryResult, DatabaseError> {
        let builder = QueryBuilder::by_partition_key(PK, pk);
        let (kce, options) = self.merged(&builder, None, options)?;
        Ok(self.store.query(&kce, &options).await?)
    }

    /// Items of the base-table partition `pk` whose sort key starts with
    /// `sk_prefix`.
    ///
    /// # Errors
    ///
    /// Same as [`Dao::query`].
    pub async fn query_prefix(
        &self,
        pk: &str,
        sk_prefix: &str,
        options: QueryOptions,
    ) -> Result<QueryResult, DatabaseError> {
        let builder = QueryBuilder::by_sort_key_prefix(PK, pk, SK, sk_prefix);
        let (kce, options) = self.merged(&builder, None, options)?;
        Ok(self.store.query(&kce, &options).await?)
    }

    /// Items of the `index_name` partition `pk`, optionally pinned to
    /// sort key `sk`.
    ///
    /// # Errors
    ///
    /// `UnknownIndex` for a name outside `GSI1`..`GSI4`, before any
    /// store call.
    pub async fn query_gsi(
        &self,
        index_name: &str,
        pk: &str,
        sk: Option<&str>,
        options: QueryOptions,
    ) -> Result<QueryResult, DatabaseError> {
        let index = parse_index(index_name)?;
        let builder = match sk {
            Some(sk) => QueryBuilder::gsi_by_keys(
                index_name,
                index.partition_key(),
                pk,
                index.sort_key(),
                sk,
            ),
            None => QueryBuilder::gsi_by_partition_key(index_name, index.partition_key(), pk),
        };
        let (kce, options) = self.merged(&builder, Some(index), options)?;
        Ok(self.store.query(&kce, &options).await?)
    }

    /// Run a fully built query.
    ///
    /// # Errors
    ///
    /// `Query` when the builder rejects its conditions, `Expression` when
    /// it has no key condition, `UnknownIndex` for a bad index name.
    pub async fn query_with(&self, builder: &QueryBuilder) -> Result<QueryResult, DatabaseError> {
        let (kce, options) = store_query(builder.build()?)?;
        Ok(self.store.query(&kce, &options).await?)
    }

    /// Number of items in the base-table partition `pk`.
    ///
    /// # Errors
    ///
    /// Same as [`Dao::query`].
    pub async fn count(&self, pk: &str, options: QueryOptions) -> Result<usize, DatabaseError> {
        let builder = QueryBuilder::by_partition_key(PK, pk);
        let (kce, options) = self.merged(&builder, None, options)?;
        Ok(self.store.count(&kce, &options).await?)
    }

    fn merged(
        &self,
        builder: &QueryBuilder,
        index: Option<Gsi>,
        mut caller: QueryOptions,
    ) -> Result<(String, QueryOptions), DatabaseError> {
        let (kce, generated) = store_query(builder.build()?)?;
        let names = caller.expression_attribute_names.take();
        let values = caller.expression_attribute_values.take();
        let mut options = QueryOptions {
            index,
            expression_attribute_names: generated.expression_attribute_names,
            expression_attribute_values: generated.expression_attribute_values,
            ..caller
        };
        filters::merge_bindings(&mut options.expression_attribute_names, names)?;
        filters::merge_bindings(&mut options.expression_attribute_values, values)?;
        debug!(entity_type = %self.entity_type, %kce, index = ?index, "query");
        Ok((kce, options))
    }

    // --- Batches ---

    /// Fetch many keys, [`MAX_BATCH_GET`] per store call.
    ///
    /// # Errors
    ///
    /// Returns the first store failure.
    pub async fn batch_get(
        &self,
        keys: &[ItemKey],
        options: &GetOptions,
    ) -> Result<Vec<Entity>, DatabaseError> {
        let mut found = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(MAX_BATCH_GET) {
            found.extend(self.store.batch_get(chunk, options).await?);
        }
        Ok(found)
    }

    /// Validate every item, then put them [`MAX_BATCH_WRITE`] per call.
    ///
    /// # Errors
    ///
    /// `Validation` before any write if any item is invalid.
    pub async fn batch_write(&self, items: Vec<Entity>) -> Result<(), DatabaseError> {
        for item in &items {
            self.validate(item)?;
        }
        let total = items.len();
        for chunk in items.chunks(MAX_BATCH_WRITE) {
            self.store.batch_write(chunk.to_vec(), WriteKind::Put).await?;
        }
        debug!(entity_type = %self.entity_type, total, "batch write");
        Ok(())
    }

    /// Atomic multi-item write.
    ///
    /// # Errors
    ///
    /// `LimitExceeded` for more than [`MAX_TRANSACTION_ITEMS`] items,
    /// before any store call.
    pub async fn transaction(&self, items: Vec<TransactionItem>) -> Result<(), DatabaseError> {
        if items.len() > MAX_TRANSACTION_ITEMS {
            return Err(DatabaseError::LimitExceeded(format!(
                "Transaction cannot contain more than {MAX_TRANSACTION_ITEMS} items"
            )));
        }
        Ok(self.store.transaction(items).await?)
    }
}

fn not_found(key: &ItemKey) -> DatabaseError {
    DatabaseError::NotFound {
        pk: key.pk.clone(),
        sk: key.sk.clone(),
    }
}

fn duplicate(key: &ItemKey) -> DatabaseError {
    DatabaseError::DuplicateKey {
        pk: key.pk.clone(),
        sk: key.sk.clone(),
    }
}

fn parse_index(name: &str) -> Result<Gsi, DatabaseError> {
    name.parse().map_err(|_| DatabaseError::UnknownIndex(name.to_string()))
}

/// Split built params into a key condition and store options.
fn store_query(params: QueryParams) -> Result<(String, QueryOptions), DatabaseError> {
    let index = params.index_name.as_deref().map(parse_index).transpose()?;
    let kce = params
        .key_condition_expression
        .ok_or_else(|| DatabaseError::Expression("a query needs a key condition".into()))?;
    Ok((
        kce,
        QueryOptions {
            index,
            filter_expression: params.filter_expression,
            projection_expression: params.projection_expression,
            expression_attribute_names: params.expression_attribute_names,
            expression_attribute_values: params.expression_attribute_values,
            limit: params.limit,
            exclusive_start_key: params.exclusive_start_key,
            scan_index_forward: params.scan_index_forward,
            consistent_read: params.consistent_read,
        },
    ))
}
