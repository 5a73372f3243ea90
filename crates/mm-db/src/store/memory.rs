//! In-process single-table store.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use mm_core::entity::{PK, SK};
use mm_core::{Entity, ItemKey, WriteKind};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use super::expression::{ConditionExpr, Projection, UpdateExpr, compare_values};
use super::{
    Bindings, Condition, DeleteOptions, GetOptions, KeyValueStore, MAX_BATCH_GET,
    MAX_BATCH_WRITE, MAX_TRANSACTION_ITEMS, QueryOptions, QueryResult, ReturnValues, StoreError,
    TransactionItem, UpdateRequest,
};

/// Call counters, readable while the store is in use.
#[derive(Debug, Default)]
pub struct StoreMetrics {
    requests: AtomicU64,
    batch_get_calls: AtomicU64,
    batch_write_calls: AtomicU64,
    write_calls: AtomicU64,
    conditional_failures: AtomicU64,
}

/// Point-in-time copy of [`StoreMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub batch_get_calls: u64,
    pub batch_write_calls: u64,
    /// Single-item writes and transactions.
    pub write_calls: u64,
    pub conditional_failures: u64,
}

impl StoreMetrics {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, AtomicOrdering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(AtomicOrdering::Relaxed),
            batch_get_calls: self.batch_get_calls.load(AtomicOrdering::Relaxed),
            batch_write_calls: self.batch_write_calls.load(AtomicOrdering::Relaxed),
            write_calls: self.write_calls.load(AtomicOrdering::Relaxed),
            conditional_failures: self.conditional_failures.load(AtomicOrdering::Relaxed),
        }
    }
}

/// A [`KeyValueStore`] over an ordered in-memory map.
///
/// Secondary indexes are sparse: an item is visible to `GSIn` only when
/// it carries `GSInPK`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<BTreeMap<ItemKey, Entity>>,
    metrics: StoreMetrics,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-loaded with `items`. Items without a key are rejected.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::MissingKey` if any item lacks `PK` or `SK`.
    pub fn with_items(items: impl IntoIterator<Item = Entity>) -> Result<Self, StoreError> {
        let mut map = BTreeMap::new();
        for item in items {
            let key = item.key().ok_or(StoreError::MissingKey)?;
            map.insert(key, item);
        }
        Ok(Self {
            items: RwLock::new(map),
            metrics: StoreMetrics::default(),
        })
    }

    #[must_use]
    pub const fn metrics(&self) -> &StoreMetrics {
        &self.metrics
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Every item, in key order.
    pub async fn items(&self) -> Vec<Entity> {
        self.items.read().await.values().cloned().collect()
    }

    fn check(
        &self,
        condition: Option<&Condition>,
        key: &ItemKey,
        current: Option<&Entity>,
    ) -> Result<(), StoreError> {
        let Some(condition) = condition else {
            return Ok(());
        };
        let parsed = ConditionExpr::parse(&condition.expression, condition.bindings())?;
        let empty = Entity::new();
        if parsed.matches(current.unwrap_or(&empty)) {
            Ok(())
        } else {
            StoreMetrics::bump(&self.metrics.conditional_failures);
            Err(StoreError::ConditionalCheckFailed {
                pk: key.pk.clone(),
                sk: key.sk.clone(),
            })
        }
    }

    /// Compute the update without writing it: `(new item, returned image)`.
    fn stage_update(
        &self,
        key: &ItemKey,
        request: &UpdateRequest,
        current: Option<&Entity>,
    ) -> Result<(Entity, Option<Entity>), StoreError> {
        let bindings = request.bindings();
        let update = UpdateExpr::parse(&request.update_expression, bindings)?;
        let touched = update.touched();
        if let Some(path) = touched.iter().find(|p| key_segment(p)) {
            return Err(StoreError::Expression(format!("cannot update key attribute `{path}`")));
        }
        if let Some(expression) = &request.condition_expression {
            let condition = Condition {
                expression: expression.clone(),
                names: request.expression_attribute_names.clone(),
                values: request.expression_attribute_values.clone(),
            };
            self.check(Some(&condition), key, current)?;
        }

        let base = current.cloned().unwrap_or_else(|| {
            let mut fresh = Entity::new();
            key.apply(&mut fresh);
            fresh
        });
        let updated = update.apply(&base)?;

        let touched_only = |item: &Entity| {
            let mut image = Entity::new();
            for path in &touched {
                if let Some(value) = item.get_path(path) {
                    image.set_path(path, value.clone());
                }
            }
            image
        };
        let image = match request.return_values {
            ReturnValues::None => None,
            ReturnValues::AllOld => current.cloned(),
            ReturnValues::UpdatedOld => current.map(touched_only),
            ReturnValues::AllNew => Some(updated.clone()),
            ReturnValues::UpdatedNew => Some(touched_only(&updated)),
        };
        Ok((updated, image))
    }

    fn select(
        items: &BTreeMap<ItemKey, Entity>,
        key_condition_expression: &str,
        options: &QueryOptions,
        paged: bool,
    ) -> Result<QueryResult, StoreError> {
        let bindings = options.bindings();
        let key_condition = ConditionExpr::parse(key_condition_expression, bindings)?;
        let (pk_attr, sk_attr) = options
            .index
            .map_or((PK, SK), |gsi| (gsi.partition_key(), gsi.sort_key()));
        let partition = key_condition.equality_on(pk_attr).ok_or_else(|| {
            StoreError::Expression(format!("key condition must fix {pk_attr} with `=`"))
        })?;
        let filter = options
            .filter_expression
            .as_deref()
            .map(|f| ConditionExpr::parse(f, bindings))
            .transpose()?;
        let projection = parse_projection(
            options.projection_expression.as_deref(),
            Bindings::new(options.expression_attribute_names.as_ref(), None),
        )?;

        let forward = options.scan_index_forward.unwrap_or(true);
        let directed = |a: &Entity, b: &Entity| {
            let ordering = position_cmp(a, b, sk_attr);
            if forward { ordering } else { ordering.reverse() }
        };

        let mut candidates: Vec<&Entity> = items
            .values()
            .filter(|item| item.get(pk_attr) == Some(partition) && key_condition.matches(item))
            .collect();
        candidates.sort_by(|a, b| directed(a, b));

        if let Some(start) = &options.exclusive_start_key {
            candidates.retain(|item| directed(item, start) == Ordering::Greater);
        }

        let limit = if paged { options.limit } else { None };
        let evaluated: Vec<&Entity> = match limit {
            Some(limit) => candidates.iter().take(limit).copied().collect(),
            None => candidates.clone(),
        };
        let last_evaluated_key = if evaluated.len() < candidates.len() {
            evaluated.last().map(|item| page_key(item, pk_attr, sk_attr))
        } else {
            None
        };

        let items: Vec<Entity> = evaluated
            .iter()
            .filter(|item| filter.as_ref().is_none_or(|f| f.matches(item)))
            .map(|item| project(item, projection.as_ref()))
            .collect();

        Ok(QueryResult {
            count: items.len(),
            scanned_count: evaluated.len(),
            items,
            last_evaluated_key,
        })
    }
}

fn key_segment(path: &str) -> bool {
    let top = path.split('.').next().unwrap_or(path);
    top == PK || top == SK
}

fn parse_projection(
    expression: Option<&str>,
    bindings: Bindings<'_>,
) -> Result<Option<Projection>, StoreError> {
    expression.map(|p| Projection::parse(p, bindings)).transpose()
}

fn project(item: &Entity, projection: Option<&Projection>) -> Entity {
    projection.map_or_else(|| item.clone(), |p| p.apply(item))
}

/// Order by index sort key, then `PK`, then `SK`.
fn position_cmp(a: &Entity, b: &Entity, sk_attr: &str) -> Ordering {
    let by_sort = match (a.get(sk_attr), b.get(sk_attr)) {
        (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
        (x, y) => x.is_some().cmp(&y.is_some()),
    };
    by_sort
        .then_with(|| a.pk().cmp(&b.pk()))
        .then_with(|| a.sk().cmp(&b.sk()))
}

/// Keys needed to resume after `item`.
fn page_key(item: &Entity, pk_attr: &str, sk_attr: &str) -> Entity {
    let mut key = Entity::new();
    for attr in [PK, SK, pk_attr, sk_attr] {
        if let Some(value) = item.get(attr) {
            key.insert(attr, value.clone());
        }
    }
    key
}

fn ensure_within(len: usize, max: usize, what: &str) -> Result<(), StoreError> {
    if len > max {
        return Err(StoreError::LimitExceeded(format!(
            "{what} cannot contain more than {max} items"
        )));
    }
    Ok(())
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn put_item(&self, item: Entity, condition: Option<Condition>) -> Result<(), StoreError> {
        StoreMetrics::bump(&self.metrics.requests);
        let key = item.key().ok_or(StoreError::MissingKey)?;
        let mut items = self.items.write().await;
        self.check(condition.as_ref(), &key, items.get(&key))?;
        StoreMetrics::bump(&self.metrics.write_calls);
        debug!(pk = %key.pk, sk = %key.sk, "put_item");
        items.insert(key, item);
        Ok(())
    }

    async fn get_item(
        &self,
        key: &ItemKey,
        options: &GetOptions,
    ) -> Result<Option<Entity>, StoreError> {
        StoreMetrics::bump(&self.metrics.requests);
        let projection = parse_projection(
            options.projection_expression.as_deref(),
            Bindings::new(options.expression_attribute_names.as_ref(), None),
        )?;
        let items = self.items.read().await;
        Ok(items.get(key).map(|item| project(item, projection.as_ref())))
    }

    async fn update_item(
        &self,
        key: &ItemKey,
        request: UpdateRequest,
    ) -> Result<Option<Entity>, StoreError> {
        StoreMetrics::bump(&self.metrics.requests);
        let mut items = self.items.write().await;
        let (updated, image) = self.stage_update(key, &request, items.get(key))?;
        StoreMetrics::bump(&self.metrics.write_calls);
        debug!(pk = %key.pk, sk = %key.sk, "update_item");
        items.insert(key.clone(), updated);
        Ok(image)
    }

    async fn delete_item(
        &self,
        key: &ItemKey,
        options: DeleteOptions,
    ) -> Result<Option<Entity>, StoreError> {
        StoreMetrics::bump(&self.metrics.requests);
        let mut items = self.items.write().await;
        self.check(options.condition.as_ref(), key, items.get(key))?;
        StoreMetrics::bump(&self.metrics.write_calls);
        debug!(pk = %key.pk, sk = %key.sk, "delete_item");
        Ok(items.remove(key))
    }

    async fn query(
        &self,
        key_condition_expression: &str,
        options: &QueryOptions,
    ) -> Result<QueryResult, StoreError> {
        StoreMetrics::bump(&self.metrics.requests);
        let items = self.items.read().await;
        Self::select(&items, key_condition_expression, options, true)
    }

    async fn batch_get(
        &self,
        keys: &[ItemKey],
        options: &GetOptions,
    ) -> Result<Vec<Entity>, StoreError> {
        StoreMetrics::bump(&self.metrics.requests);
        ensure_within(keys.len(), MAX_BATCH_GET, "Batch get")?;
        StoreMetrics::bump(&self.metrics.batch_get_calls);
        let projection = parse_projection(
            options.projection_expression.as_deref(),
            Bindings::new(options.expression_attribute_names.as_ref(), None),
        )?;
        let items = self.items.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| items.get(key))
            .map(|item| project(item, projection.as_ref()))
            .collect())
    }

    async fn batch_write(&self, batch: Vec<Entity>, kind: WriteKind) -> Result<(), StoreError> {
        StoreMetrics::bump(&self.metrics.requests);
        ensure_within(batch.len(), MAX_BATCH_WRITE, "Batch write")?;
        let keyed = batch
            .into_iter()
            .map(|item| item.key().map(|key| (key, item)).ok_or(StoreError::MissingKey))
            .collect::<Result<Vec<_>, _>>()?;

        StoreMetrics::bump(&self.metrics.batch_write_calls);
        debug!(%kind, count = keyed.len(), "batch_write");
        let mut items = self.items.write().await;
        for (key, item) in keyed {
            match kind {
                WriteKind::Put => {
                    items.insert(key, item);
                }
                WriteKind::Delete => {
                    items.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn transaction(&self, ops: Vec<TransactionItem>) -> Result<(), StoreError> {
        StoreMetrics::bump(&self.metrics.requests);
        ensure_within(ops.len(), MAX_TRANSACTION_ITEMS, "Transaction")?;

        let mut seen = BTreeSet::new();
        for op in &ops {
            let key = op.key().ok_or(StoreError::MissingKey)?;
            if !seen.insert(key.clone()) {
                return Err(StoreError::TransactionCanceled(format!(
                    "multiple operations on PK={}, SK={}",
                    key.pk, key.sk
                )));
            }
        }

        let mut items = self.items.write().await;

        // Stage every write, checking all conditions before touching the map.
        let mut staged: Vec<(ItemKey, Option<Entity>)> = Vec::with_capacity(ops.len());
        for op in &ops {
            let outcome = match op {
                TransactionItem::Put { item, condition } => {
                    item.key().ok_or(StoreError::MissingKey).and_then(|key| {
                        self.check(condition.as_ref(), &key, items.get(&key))?;
                        Ok(Some((key, Some(item.clone()))))
                    })
                }
                TransactionItem::Update { key, request } => self
                    .stage_update(key, request, items.get(key))
                    .map(|(updated, _)| Some((key.clone(), Some(updated)))),
                TransactionItem::Delete { key, condition } => self
                    .check(condition.as_ref(), key, items.get(key))
                    .map(|()| Some((key.clone(), None))),
                TransactionItem::ConditionCheck { key, condition } => {
                    self.check(Some(condition), key, items.get(key)).map(|()| None)
                }
            };
            match outcome {
                Ok(Some(write)) => staged.push(write),
                Ok(None) => {}
                Err(StoreError::ConditionalCheckFailed { pk, sk }) => {
                    return Err(StoreError::TransactionCanceled(format!(
                        "ConditionalCheckFailed on PK={pk}, SK={sk}"
                    )));
                }
                Err(other) => return Err(other),
            }
        }

        StoreMetrics::bump(&self.metrics.write_calls);
        debug!(count = staged.len(), "transaction");
        for (key, write) in staged {
            match write {
                Some(item) => {
                    items.insert(key, item);
                }
                None => {
                    items.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn count(
        &self,
        key_condition_expression: &str,
        options: &QueryOptions,
    ) -> Result<usize, StoreError> {
        StoreMetrics::bump(&self.metrics.requests);
        let items = self.items.read().await;
        Ok(Self::select(&items, key_condition_expression, options, false)?.count)
    }
}
