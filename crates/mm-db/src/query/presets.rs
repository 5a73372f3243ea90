//! Ready-made builders for the common access patterns.

use serde_json::Value;

use super::builder::QueryBuilder;

impl QueryBuilder {
    /// `pk_attr = value`.
    #[must_use]
    pub fn by_partition_key(pk_attr: &str, value: impl Into<Value>) -> Self {
        Self::new().partition_key(pk_attr, value)
    }

    /// Exact item lookup through a query.
    #[must_use]
    pub fn by_keys(
        pk_attr: &str,
        pk_value: impl Into<Value>,
        sk_attr: &str,
        sk_value: impl Into<Value>,
    ) -> Self {
        Self::new()
            .partition_key(pk_attr, pk_value)
            .partition_key(sk_attr, sk_value)
    }

    /// Partition plus `begins_with` on the sort key.
    #[must_use]
    pub fn by_sort_key_prefix(
        pk_attr: &str,
        pk_value: impl Into<Value>,
        sk_attr: &str,
        prefix: impl Into<Value>,
    ) -> Self {
        Self::new()
            .partition_key(pk_attr, pk_value)
            .begins_with(sk_attr, prefix)
    }

    #[must_use]
    pub fn gsi_by_partition_key(index_name: &str, pk_attr: &str, value: impl Into<Value>) -> Self {
        Self::by_partition_key(pk_attr, value).use_index(index_name)
    }

    #[must_use]
    pub fn gsi_by_keys(
        index_name: &str,
        pk_attr: &str,
        pk_value: impl Into<Value>,
        sk_attr: &str,
        sk_value: impl Into<Value>,
    ) -> Self {
        Self::by_keys(pk_attr, pk_value, sk_attr, sk_value).use_index(index_name)
    }
}
