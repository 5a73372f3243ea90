//! The query builder and its rendered output.

use mm_core::Entity;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::condition::{Operator, QueryCondition, SortCondition};
use crate::store::{AttributeNames, AttributeValues};

/// Caller errors detected when rendering conditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("{operator} on `{attribute}` requires a value")]
    MissingValue { attribute: String, operator: Operator },

    #[error("{operator} on `{attribute}` requires {expected}")]
    MissingValues {
        attribute: String,
        operator: Operator,
        expected: &'static str,
    },

    #[error("{operator} is not supported in a key condition (attribute `{attribute}`)")]
    UnsupportedKeyOperator { attribute: String, operator: Operator },
}

/// Rendered query: expressions, placeholder maps, and pass-through options.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_condition_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression_attribute_names: Option<AttributeNames>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression_attribute_values: Option<AttributeValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_start_key: Option<Entity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistent_read: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_index_forward: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortCondition>,
}

/// Sequential `#attrN` / `:valN` allocation for one `build()`.
#[derive(Default)]
struct Placeholders {
    names: AttributeNames,
    values: AttributeValues,
    next_name: usize,
    next_value: usize,
}

impl Placeholders {
    fn name(&mut self, attribute: &str) -> String {
        let placeholder = format!("#attr{}", self.next_name);
        self.next_name += 1;
        self.names.insert(placeholder.clone(), attribute.to_string());
        placeholder
    }

    fn value(&mut self, value: Value) -> String {
        let placeholder = format!(":val{}", self.next_value);
        self.next_value += 1;
        self.values.insert(placeholder.clone(), value);
        placeholder
    }
}

/// Fluent builder over key conditions, filters, and projection.
///
/// Nothing is validated until [`QueryBuilder::build`]; the same call
/// sequence always renders the same output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBuilder {
    key_conditions: Vec<QueryCondition>,
    filter_conditions: Vec<QueryCondition>,
    sort: Vec<SortCondition>,
    projection: Vec<String>,
    index_name: Option<String>,
    limit: Option<usize>,
    exclusive_start_key: Option<Entity>,
    consistent_read: Option<bool>,
    scan_index_forward: Option<bool>,
}

impl QueryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Conditions ---

    #[must_use]
    pub fn key_condition(mut self, condition: QueryCondition) -> Self {
        self.key_conditions.push(condition);
        self
    }

    #[must_use]
    pub fn filter_condition(mut self, condition: QueryCondition) -> Self {
        self.filter_conditions.push(condition);
        self
    }

    #[must_use]
    pub fn partition_key(self, attribute: &str, value: impl Into<Value>) -> Self {
        self.key_condition(QueryCondition::with_value(attribute, Operator::Eq, value))
    }

    #[must_use]
    pub fn sort_key(self, attribute: &str, operator: Operator, value: impl Into<Value>) -> Self {
        self.key_condition(QueryCondition::with_value(attribute, operator, value))
    }

    #[must_use]
    pub fn begins_with(self, attribute: &str, prefix: impl Into<Value>) -> Self {
        self.key_condition(QueryCondition::with_value(attribute, Operator::BeginsWith, prefix))
    }

    #[must_use]
    pub fn between(self, attribute: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.key_condition(QueryCondition::with_values(
            attribute,
            Operator::Between,
            [low.into(), high.into()],
        ))
    }

    #[must_use]
    pub fn exists(self, attribute: &str) -> Self {
        self.filter_condition(QueryCondition::new(attribute, Operator::Exists))
    }

    #[must_use]
    pub fn not_exists(self, attribute: &str) -> Self {
        self.filter_condition(QueryCondition::new(attribute, Operator::NotExists))
    }

    #[must_use]
    pub fn contains(self, attribute: &str, value: impl Into<Value>) -> Self {
        self.filter_condition(QueryCondition::with_value(attribute, Operator::Contains, value))
    }

    #[must_use]
    pub fn in_values<I, V>(self, attribute: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filter_condition(QueryCondition::with_values(attribute, Operator::In, values))
    }

    // --- Options ---

    /// Replace the projected attributes.
    #[must_use]
    pub fn project<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = attributes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn use_index(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn exclusive_start_key(mut self, key: Entity) -> Self {
        self.exclusive_start_key = Some(key);
        self
    }

    #[must_use]
    pub const fn consistent_read(mut self, enabled: bool) -> Self {
        self.consistent_read = Some(enabled);
        self
    }

    #[must_use]
    pub const fn scan_index_forward(mut self, forward: bool) -> Self {
        self.scan_index_forward = Some(forward);
        self
    }

    #[must_use]
    pub fn sort_asc(mut self, attribute: Option<&str>) -> Self {
        if let Some(attribute) = attribute {
            self.sort.push(SortCondition {
                attribute: attribute.to_string(),
                ascending: true,
            });
        }
        self.scan_index_forward = Some(true);
        self
    }

    #[must_use]
    pub fn sort_desc(mut self, attribute: Option<&str>) -> Self {
        if let Some(attribute) = attribute {
            self.sort.push(SortCondition {
                attribute: attribute.to_string(),
                ascending: false,
            });
        }
        self.scan_index_forward = Some(false);
        self
    }

    // --- Rendering ---

    /// Render every declared condition into store expressions.
    ///
    /// Placeholders are numbered from 0 in declaration order: key
    /// conditions, then filters, then projection.
    ///
    /// # Errors
    ///
    /// Returns `QueryError` for `BETWEEN`/`IN` without values, a missing
    /// operand, or a filter-only operator used in a key condition.
    pub fn build(&self) -> Result<QueryParams, QueryError> {
        let mut ph = Placeholders::default();

        let key_condition_expression = render_all(&self.key_conditions, &mut ph, true)?;
        let filter_expression = render_all(&self.filter_conditions, &mut ph, false)?;
        let projection_expression = (!self.projection.is_empty()).then(|| {
            self.projection
                .iter()
                .map(|attr| ph.name(attr))
                .collect::<Vec<_>>()
                .join(", ")
        });

        Ok(QueryParams {
            key_condition_expression,
            filter_expression,
            projection_expression,
            expression_attribute_names: (!ph.names.is_empty()).then_some(ph.names),
            expression_attribute_values: (!ph.values.is_empty()).then_some(ph.values),
            index_name: self.index_name.clone(),
            limit: self.limit,
            exclusive_start_key: self.exclusive_start_key.clone(),
            consistent_read: self.consistent_read,
            scan_index_forward: self.scan_index_forward,
            sort: self.sort.clone(),
        })
    }
}

fn render_all(
    conditions: &[QueryCondition],
    ph: &mut Placeholders,
    key: bool,
) -> Result<Option<String>, QueryError> {
    if conditions.is_empty() {
        return Ok(None);
    }
    let parts = conditions
        .iter()
        .map(|c| render(c, ph, key))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(parts.join(" AND ")))
}

fn render(
    condition: &QueryCondition,
    ph: &mut Placeholders,
    key: bool,
) -> Result<String, QueryError> {
    let QueryCondition {
        attribute,
        operator,
        value,
        values,
    } = condition;
    let operator = *operator;

    if key && !operator.is_key_operator() {
        return Err(QueryError::UnsupportedKeyOperator {
            attribute: attribute.clone(),
            operator,
        });
    }

    let single = || {
        value.clone().ok_or_else(|| QueryError::MissingValue {
            attribute: attribute.clone(),
            operator,
        })
    };
    let missing_values = |expected| QueryError::MissingValues {
        attribute: attribute.clone(),
        operator,
        expected,
    };

    let rendered = match operator {
        Operator::Exists => format!("attribute_exists({})", ph.name(attribute)),
        Operator::NotExists => format!("attribute_not_exists({})", ph.name(attribute)),
        Operator::BeginsWith | Operator::Contains => {
            let operand = single()?;
            let function = if operator == Operator::BeginsWith {
                "begins_with"
            } else {
                "contains"
            };
            let name = ph.name(attribute);
            format!("{function}({name}, {})", ph.value(operand))
        }
        Operator::Between => {
            let [low, high] = values
                .as_deref()
                .and_then(|v| <&[Value; 2]>::try_from(v).ok())
                .cloned()
                .ok_or_else(|| missing_values("exactly two values"))?;
            let name = ph.name(attribute);
            let low = ph.value(low);
            format!("{name} BETWEEN {low} AND {}", ph.value(high))
        }
        Operator::In => {
            let list = values
                .as_ref()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| missing_values("a non-empty values list"))?;
            let name = ph.name(attribute);
            let refs: Vec<String> = list.iter().map(|v| ph.value(v.clone())).collect();
            format!("{name} IN ({})", refs.join(", "))
        }
        Operator::Eq | Operator::Ne | Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => {
            let operand = single()?;
            let comparator = operator.comparator().unwrap_or("=");
            let name = ph.name(attribute);
            format!("{name} {comparator} {}", ph.value(operand))
        }
    };
    Ok(rendered)
}
