//! How one source table becomes one entity type.
//!
//! A row is turned into an [`Entity`] in four ordered steps: key mapping,
//! field mapping, transformations, then filters. A `null` result from any
//! mapping leaves the attribute unset.

use std::fmt;
use std::sync::Arc;

use mm_core::{Entity, EntityType};
use serde_json::Value;

use crate::source::{self, Row};

type RowFn = Arc<dyn Fn(&Row) -> Result<Value, String> + Send + Sync>;
type TransformFn = Arc<dyn Fn(Option<&Value>, &Row) -> Result<Value, String> + Send + Sync>;
type FilterFn = Arc<dyn Fn(Option<&Value>, &Row) -> bool + Send + Sync>;

/// Where a mapping reads its rows from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Table(String),
    /// A raw `SELECT`; paged by appending `LIMIT`/`OFFSET`.
    Query(String),
}

impl SourceSpec {
    /// The statement for one page.
    #[must_use]
    pub fn page(&self, limit: usize, offset: usize) -> String {
        match self {
            Self::Table(table) => source::table_page(table, limit, offset),
            Self::Query(query) => source::query_page(query, limit, offset),
        }
    }

    /// Table name, when the row count can be asked for.
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::Table(table) => Some(table),
            Self::Query(_) => None,
        }
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table(table) => write!(f, "table {table}"),
            Self::Query(query) => write!(f, "query `{query}`"),
        }
    }
}

/// Value of one target attribute.
#[derive(Clone)]
pub enum FieldMapping {
    /// Copy a source column.
    Column(String),
    /// Compute from the whole row. An `Err` fails the record.
    Transform(RowFn),
}

impl FieldMapping {
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column(name.into())
    }

    pub fn transform<F>(f: F) -> Self
    where
        F: Fn(&Row) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self::Transform(Arc::new(f))
    }

    /// Always `value`.
    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self::transform(move |_| Ok(value.clone()))
    }

    fn resolve(&self, row: &Row) -> Result<Value, String> {
        match self {
            Self::Column(column) => Ok(row.get(column).cloned().unwrap_or(Value::Null)),
            Self::Transform(f) => f(row),
        }
    }

    /// Source column, for plan summaries.
    #[must_use]
    pub fn source_column(&self) -> Option<&str> {
        match self {
            Self::Column(column) => Some(column),
            Self::Transform(_) => None,
        }
    }
}

impl fmt::Debug for FieldMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(column) => f.debug_tuple("Column").field(column).finish(),
            Self::Transform(_) => f.write_str("Transform(..)"),
        }
    }
}

#[derive(Clone)]
struct Transformation {
    field: String,
    transform: TransformFn,
}

#[derive(Clone)]
struct Filter {
    field: String,
    condition: FilterFn,
}

/// Mapping of one source to one entity type.
#[derive(Clone)]
pub struct MigrationMapping {
    pub entity_type: EntityType,
    pub source: SourceSpec,
    key_mapping: Vec<(String, FieldMapping)>,
    field_mapping: Vec<(String, FieldMapping)>,
    transformations: Vec<Transformation>,
    filters: Vec<Filter>,
}

impl MigrationMapping {
    pub const fn new(entity_type: EntityType, source: SourceSpec) -> Self {
        Self {
            entity_type,
            source,
            key_mapping: Vec::new(),
            field_mapping: Vec::new(),
            transformations: Vec::new(),
            filters: Vec::new(),
        }
    }

    /// Map a key attribute (`PK`, `SK`, `GSI1PK`, ...).
    #[must_use]
    pub fn key(mut self, attribute: impl Into<String>, mapping: FieldMapping) -> Self {
        self.key_mapping.push((attribute.into(), mapping));
        self
    }

    /// Map a (possibly dotted) attribute.
    #[must_use]
    pub fn field(mut self, path: impl Into<String>, mapping: FieldMapping) -> Self {
        self.field_mapping.push((path.into(), mapping));
        self
    }

    /// Rewrite `path` after mapping, given its mapped value and the row.
    #[must_use]
    pub fn transformation<F>(mut self, path: impl Into<String>, transform: F) -> Self
    where
        F: Fn(Option<&Value>, &Row) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.transformations.push(Transformation {
            field: path.into(),
            transform: Arc::new(transform),
        });
        self
    }

    /// Keep only records for which `condition` holds.
    #[must_use]
    pub fn filter<F>(mut self, path: impl Into<String>, condition: F) -> Self
    where
        F: Fn(Option<&Value>, &Row) -> bool + Send + Sync + 'static,
    {
        self.filters.push(Filter {
            field: path.into(),
            condition: Arc::new(condition),
        });
        self
    }

    #[must_use]
    pub fn key_attributes(&self) -> Vec<&str> {
        self.key_mapping.iter().map(|(attr, _)| attr.as_str()).collect()
    }

    /// Target path and source column (if plain) of every field mapping.
    pub fn fields(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.field_mapping
            .iter()
            .map(|(path, mapping)| (path.as_str(), mapping.source_column()))
    }

    /// Map one row. `Ok(None)` when a filter drops it; `Err` carries the
    /// failing attribute and message.
    ///
    /// # Errors
    ///
    /// Returns the first failing transform, prefixed with its attribute.
    pub fn map_row(&self, row: &Row) -> Result<Option<Entity>, String> {
        let mut entity = Entity::new();

        for (attribute, mapping) in &self.key_mapping {
            let value = mapping.resolve(row).map_err(|e| format!("{attribute}: {e}"))?;
            if !value.is_null() {
                entity.insert(attribute.clone(), value);
            }
        }
        for (path, mapping) in &self.field_mapping {
            let value = mapping.resolve(row).map_err(|e| format!("{path}: {e}"))?;
            if !value.is_null() {
                entity.set_path(path, value);
            }
        }
        for Transformation { field, transform } in &self.transformations {
            let value =
                transform(entity.get_path(field), row).map_err(|e| format!("{field}: {e}"))?;
            if value.is_null() {
                entity.remove_path(field);
            } else {
                entity.set_path(field, value);
            }
        }

        let keep = self
            .filters
            .iter()
            .all(|Filter { field, condition }| condition(entity.get_path(field), row));
        Ok(keep.then_some(entity))
    }
}

impl fmt::Debug for MigrationMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationMapping")
            .field("entity_type", &self.entity_type)
            .field("source", &self.source)
            .field("keys", &self.key_attributes())
            .field("fields", &self.field_mapping.len())
            .field("transformations", &self.transformations.len())
            .field("filters", &self.filters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    fn mapping() -> MigrationMapping {
        MigrationMapping::new(EntityType::User, SourceSpec::Table("users".into()))
            .key(
                "PK",
                FieldMapping::transform(|r| {
                    Ok(json!(format!("USER#{}", r["id"].as_str().unwrap_or_default())))
                }),
            )
            .key("SK", FieldMapping::constant("PROFILE"))
            .field("userId", FieldMapping::column("id"))
            .field("profile.bio", FieldMapping::column("bio"))
            .field(
                "tags",
                FieldMapping::transform(|r| match r.get("tags").and_then(Value::as_str) {
                    Some(text) => serde_json::from_str(text).map_err(|e| e.to_string()),
                    None => Ok(json!([])),
                }),
            )
    }

    #[test]
    fn maps_keys_fields_and_nested_paths() {
        let entity = mapping()
            .map_row(&row(json!({"id": "u1", "bio": "hi", "tags": "[\"a\"]"})))
            .unwrap()
            .unwrap();
        assert_eq!(
            Value::from(entity),
            json!({
                "PK": "USER#u1",
                "SK": "PROFILE",
                "userId": "u1",
                "profile": {"bio": "hi"},
                "tags": ["a"]
            })
        );
    }

    #[test]
    fn null_columns_stay_unset() {
        let entity = mapping().map_row(&row(json!({"id": "u1", "bio": null}))).unwrap().unwrap();
        assert!(entity.get_path("profile.bio").is_none());
        assert!(entity.get("profile").is_none());
    }

    #[test]
    fn transformations_see_mapped_value_and_row() {
        let mapped = mapping()
            .transformation("userId", |v, r| {
                Ok(json!(format!("{}-{}", v.and_then(Value::as_str).unwrap_or("?"), r.len())))
            })
            .map_row(&row(json!({"id": "u1"})))
            .unwrap()
            .unwrap();
        assert_eq!(mapped.get("userId"), Some(&json!("u1-1")));
    }

    #[test]
    fn null_transformation_clears_a_mapped_field() {
        let scrubbed = mapping()
            .field("secret", FieldMapping::column("ssn"))
            .transformation("secret", |_, _| Ok(Value::Null))
            .transformation("profile.bio", |_, _| Ok(Value::Null))
            .map_row(&row(json!({"id": "u1", "ssn": "123-45-6789", "bio": "hi"})))
            .unwrap()
            .unwrap();
        assert!(!scrubbed.contains("secret"));
        assert!(scrubbed.get_path("profile.bio").is_none());
        assert_eq!(scrubbed.get("userId"), Some(&json!("u1")));
    }

    #[test]
    fn filters_drop_records() {
        let adults_only = mapping().filter("userId", |v, _| v != Some(&json!("kid")));
        assert!(adults_only.map_row(&row(json!({"id": "kid"}))).unwrap().is_none());
        assert!(adults_only.map_row(&row(json!({"id": "u1"}))).unwrap().is_some());
    }

    #[test]
    fn transform_errors_name_the_attribute() {
        let err = mapping().map_row(&row(json!({"id": "u1", "tags": "[oops"}))).unwrap_err();
        assert!(err.starts_with("tags: "), "{err}");
    }

    #[test]
    fn pages_follow_the_source_kind() {
        assert_eq!(
            SourceSpec::Table("users".into()).page(2, 4),
            "SELECT * FROM users LIMIT 2 OFFSET 4"
        );
        assert_eq!(
            SourceSpec::Query("SELECT id FROM users".into()).page(10, 0),
            "SELECT id FROM users LIMIT 10 OFFSET 0"
        );
    }
}
