//! The key-value store interface the DAO talks to, and its in-process
//! implementation.

pub mod expression;
pub mod memory;
pub mod snapshot;

use std::collections::BTreeMap;

use async_trait::async_trait;
use mm_core::{Entity, Gsi, ItemKey, WriteKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use expression::Bindings;
pub use memory::{MemoryStore, MetricsSnapshot, StoreMetrics};

/// Placeholder → attribute name.
pub type AttributeNames = BTreeMap<String, String>;
/// Placeholder → attribute value.
pub type AttributeValues = BTreeMap<String, Value>;

/// Keys per `batch_get` call.
pub const MAX_BATCH_GET: usize = 100;
/// Items per `batch_write` call.
pub const MAX_BATCH_WRITE: usize = 25;
/// Items per `transaction` call.
pub const MAX_TRANSACTION_ITEMS: usize = 25;

/// Errors raised by a [`KeyValueStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("The conditional request failed for PK={pk}, SK={sk}")]
    ConditionalCheckFailed { pk: String, sk: String },

    #[error("Item is missing its PK or SK")]
    MissingKey,

    #[error("Transaction cancelled: {0}")]
    TransactionCanceled(String),

    #[error("Invalid expression: {0}")]
    Expression(String),

    #[error("{0}")]
    LimitExceeded(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A condition expression with its placeholder maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names: Option<AttributeNames>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<AttributeValues>,
}

impl Condition {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            names: None,
            values: None,
        }
    }

    #[must_use]
    pub fn name(mut self, placeholder: impl Into<String>, attribute: impl Into<String>) -> Self {
        self.names
            .get_or_insert_with(BTreeMap::new)
            .insert(placeholder.into(), attribute.into());
        self
    }

    #[must_use]
    pub fn value(mut self, placeholder: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values
            .get_or_insert_with(BTreeMap::new)
            .insert(placeholder.into(), value.into());
        self
    }

    /// `attribute_not_exists(PK)`: the put must not overwrite.
    #[must_use]
    pub fn item_absent() -> Self {
        Self::new("attribute_not_exists(#pk)").name("#pk", mm_core::entity::PK)
    }

    #[must_use]
    pub fn bindings(&self) -> Bindings<'_> {
        Bindings::new(self.names.as_ref(), self.values.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetOptions {
    pub consistent_read: bool,
    pub projection_expression: Option<String>,
    pub expression_attribute_names: Option<AttributeNames>,
}

/// Options of a query against the table or one of its indexes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// `None` targets the base table.
    pub index: Option<Gsi>,
    pub filter_expression: Option<String>,
    pub projection_expression: Option<String>,
    pub expression_attribute_names: Option<AttributeNames>,
    pub expression_attribute_values: Option<AttributeValues>,
    /// Items evaluated before the filter.
    pub limit: Option<usize>,
    pub exclusive_start_key: Option<Entity>,
    /// Ascending when `None`.
    pub scan_index_forward: Option<bool>,
    pub consistent_read: Option<bool>,
}

impl QueryOptions {
    #[must_use]
    pub fn bindings(&self) -> Bindings<'_> {
        Bindings::new(
            self.expression_attribute_names.as_ref(),
            self.expression_attribute_values.as_ref(),
        )
    }
}

/// Which image an update returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnValues {
    #[default]
    None,
    AllOld,
    UpdatedOld,
    AllNew,
    UpdatedNew,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateRequest {
    pub update_expression: String,
    pub condition_expression: Option<String>,
    pub expression_attribute_names: Option<AttributeNames>,
    pub expression_attribute_values: Option<AttributeValues>,
    pub return_values: ReturnValues,
}

impl UpdateRequest {
    #[must_use]
    pub fn bindings(&self) -> Bindings<'_> {
        Bindings::new(
            self.expression_attribute_names.as_ref(),
            self.expression_attribute_values.as_ref(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteOptions {
    pub condition: Option<Condition>,
}

/// One write (or check) of an atomic transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionItem {
    Put {
        item: Entity,
        condition: Option<Condition>,
    },
    Update {
        key: ItemKey,
        request: UpdateRequest,
    },
    Delete {
        key: ItemKey,
        condition: Option<Condition>,
    },
    ConditionCheck {
        key: ItemKey,
        condition: Condition,
    },
}

impl TransactionItem {
    /// Key of the item this operation targets.
    #[must_use]
    pub fn key(&self) -> Option<ItemKey> {
        match self {
            Self::Put { item, .. } => item.key(),
            Self::Update { key, .. }
            | Self::Delete { key, .. }
            | Self::ConditionCheck { key, .. } => Some(key.clone()),
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub items: Vec<Entity>,
    /// Set when more items remain; pass back as `exclusive_start_key`.
    pub last_evaluated_key: Option<Entity>,
    pub count: usize,
    pub scanned_count: usize,
}

/// A DynamoDB-shaped single-table store.
///
/// Expressions use `#name`/`:value` placeholders. Batch calls never
/// exceed [`MAX_BATCH_GET`] / [`MAX_BATCH_WRITE`] items; callers chunk.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Write `item`, replacing any item with the same key.
    async fn put_item(&self, item: Entity, condition: Option<Condition>) -> Result<(), StoreError>;

    async fn get_item(
        &self,
        key: &ItemKey,
        options: &GetOptions,
    ) -> Result<Option<Entity>, StoreError>;

    /// Apply an update expression. Returns the image selected by
    /// `return_values`.
    async fn update_item(
        &self,
        key: &ItemKey,
        request: UpdateRequest,
    ) -> Result<Option<Entity>, StoreError>;

    /// Delete and return the old item, if any.
    async fn delete_item(
        &self,
        key: &ItemKey,
        options: DeleteOptions,
    ) -> Result<Option<Entity>, StoreError>;

    async fn query(
        &self,
        key_condition_expression: &str,
        options: &QueryOptions,
    ) -> Result<QueryResult, StoreError>;

    /// Fetch up to [`MAX_BATCH_GET`] keys. Missing keys are omitted.
    async fn batch_get(
        &self,
        keys: &[ItemKey],
        options: &GetOptions,
    ) -> Result<Vec<Entity>, StoreError>;

    /// Put or delete up to [`MAX_BATCH_WRITE`] items. Deletes use each
    /// item's key.
    async fn batch_write(&self, items: Vec<Entity>, kind: WriteKind) -> Result<(), StoreError>;

    /// Apply every item or none of them.
    async fn transaction(&self, items: Vec<TransactionItem>) -> Result<(), StoreError>;

    async fn exists(&self, key: &ItemKey) -> Result<bool, StoreError> {
        Ok(self.get_item(key, &GetOptions::default()).await?.is_some())
    }

    /// Number of items a query would return, over all pages.
    async fn count(
        &self,
        key_condition_expression: &str,
        options: &QueryOptions,
    ) -> Result<usize, StoreError>;
}
