//! Declared conditions: an attribute, an operator, and its operands.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Comparison and function operators a condition can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Between,
    In,
    BeginsWith,
    Contains,
    Exists,
    NotExists,
}

impl Operator {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Lt => "LT",
            Self::Le => "LE",
            Self::Gt => "GT",
            Self::Ge => "GE",
            Self::Between => "BETWEEN",
            Self::In => "IN",
            Self::BeginsWith => "BEGINS_WITH",
            Self::Contains => "CONTAINS",
            Self::Exists => "EXISTS",
            Self::NotExists => "NOT_EXISTS",
        }
    }

    /// Whether the operator may appear in a key condition.
    #[must_use]
    pub const fn is_key_operator(self) -> bool {
        !matches!(self, Self::Contains | Self::Exists | Self::NotExists)
    }

    /// Infix comparator, for the binary operators.
    pub(crate) const fn comparator(self) -> Option<&'static str> {
        match self {
            Self::Eq => Some("="),
            Self::Ne => Some("<>"),
            Self::Lt => Some("<"),
            Self::Le => Some("<="),
            Self::Gt => Some(">"),
            Self::Ge => Some(">="),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared condition. `value` feeds single-operand operators,
/// `values` feeds `BETWEEN` and `IN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCondition {
    pub attribute: String,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
}

impl QueryCondition {
    /// A condition with no operands (`EXISTS`, `NOT_EXISTS`).
    pub fn new(attribute: impl Into<String>, operator: Operator) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            value: None,
            values: None,
        }
    }

    pub fn with_value(
        attribute: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::new(attribute, operator)
        }
    }

    pub fn with_values<I, V>(attribute: impl Into<String>, operator: Operator, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            values: Some(values.into_iter().map(Into::into).collect()),
            ..Self::new(attribute, operator)
        }
    }
}

/// Requested ordering. Only the direction reaches the store, as
/// `scan_index_forward`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortCondition {
    pub attribute: String,
    pub ascending: bool,
}
