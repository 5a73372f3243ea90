//! The persisted record of the single table.
//!
//! An [`Entity`] is an attribute map. The system attributes every record
//! carries (`PK`, `SK`, `entityType`, `version`, `createdAt`, `updatedAt`) are
//! exposed through typed accessors; everything else is free-form JSON that
//! the per-entity validators check.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::enums::EntityType;
use crate::errors::CoreError;

pub const PK: &str = "PK";
pub const SK: &str = "SK";
pub const ENTITY_TYPE: &str = "entityType";
pub const VERSION: &str = "version";
pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";
pub const TTL: &str = "ttl";

/// Attributes the DAO owns. Callers never set these through an update.
pub const SYSTEM_ATTRIBUTES: [&str; 5] = [PK, SK, CREATED_AT, UPDATED_AT, VERSION];

/// Composite primary key of an item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    #[serde(rename = "PK")]
    pub pk: String,
    #[serde(rename = "SK")]
    pub sk: String,
}

impl ItemKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }

    /// Write `PK`/`SK` onto an entity.
    pub fn apply(&self, entity: &mut Entity) {
        entity.insert(PK, self.pk.clone());
        entity.insert(SK, self.sk.clone());
    }
}

/// A single-table record: attribute name to JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(Map<String, Value>);

impl Entity {
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    #[must_use]
    pub const fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, attr: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(attr.into(), value.into());
        self
    }

    pub fn insert(&mut self, attr: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(attr.into(), value.into())
    }

    pub fn remove(&mut self, attr: &str) -> Option<Value> {
        self.0.remove(attr)
    }

    #[must_use]
    pub fn get(&self, attr: &str) -> Option<&Value> {
        self.0.get(attr)
    }

    #[must_use]
    pub fn contains(&self, attr: &str) -> bool {
        self.0.contains_key(attr)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// String value of a top-level attribute.
    #[must_use]
    pub fn str_attr(&self, attr: &str) -> Option<&str> {
        self.0.get(attr).and_then(Value::as_str)
    }

    #[must_use]
    pub fn pk(&self) -> Option<&str> {
        self.str_attr(PK)
    }

    #[must_use]
    pub fn sk(&self) -> Option<&str> {
        self.str_attr(SK)
    }

    /// `(PK, SK)` when both are strings.
    #[must_use]
    pub fn key(&self) -> Option<ItemKey> {
        Some(ItemKey::new(self.pk()?, self.sk()?))
    }

    /// Raw `entityType` discriminator.
    #[must_use]
    pub fn entity_type_tag(&self) -> Option<&str> {
        self.str_attr(ENTITY_TYPE)
    }

    /// Parsed `entityType`. `None` when absent or not a known type.
    #[must_use]
    pub fn entity_type(&self) -> Option<EntityType> {
        self.entity_type_tag()?.parse().ok()
    }

    #[must_use]
    pub fn version(&self) -> Option<u64> {
        self.0.get(VERSION).and_then(Value::as_u64)
    }

    #[must_use]
    pub fn created_at(&self) -> Option<&str> {
        self.str_attr(CREATED_AT)
    }

    #[must_use]
    pub fn updated_at(&self) -> Option<&str> {
        self.str_attr(UPDATED_AT)
    }

    /// TTL in epoch seconds.
    #[must_use]
    pub fn ttl(&self) -> Option<i64> {
        self.0.get(TTL).and_then(Value::as_i64)
    }

    /// Read a dotted path (`profile.contact.email`).
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        segments.try_fold(self.0.get(first)?, |current, segment| current.get(segment))
    }

    /// Write a dotted path, creating intermediate objects. A non-object
    /// intermediate value is replaced by an empty object.
    pub fn set_path(&mut self, path: &str, value: Value) {
        set_path_in(&mut self.0, path, value);
    }

    /// Drop a dotted path. Missing or non-object intermediates are a no-op.
    pub fn remove_path(&mut self, path: &str) -> Option<Value> {
        remove_path_in(&mut self.0, path)
    }
}

impl From<Map<String, Value>> for Entity {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Entity> for Value {
    fn from(entity: Entity) -> Self {
        Self::Object(entity.0)
    }
}

impl TryFrom<Value> for Entity {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(CoreError::Validation(format!(
                "entity must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

/// Write `value` at a dotted path inside `map`.
pub fn set_path_in(map: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let slot = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                set_path_in(inner, rest, value);
            }
        }
    }
}

pub fn remove_path_in(map: &mut Map<String, Value>, path: &str) -> Option<Value> {
    match path.split_once('.') {
        None => map.remove(path),
        Some((head, rest)) => match map.get_mut(head) {
            Some(Value::Object(inner)) => remove_path_in(inner, rest),
            _ => None,
        },
    }
}

/// Short name of a JSON value's kind, for messages.
#[must_use]
pub const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn system_accessors_read_typed_values() {
        let entity = Entity::new()
            .with(PK, "USER#1")
            .with(SK, "PROFILE")
            .with(ENTITY_TYPE, "USER")
            .with(VERSION, 3)
            .with(CREATED_AT, "2024-01-01T00:00:00.000Z");

        assert_eq!(entity.pk(), Some("USER#1"));
        assert_eq!(entity.key(), Some(ItemKey::new("USER#1", "PROFILE")));
        assert_eq!(entity.entity_type(), Some(EntityType::User));
        assert_eq!(entity.version(), Some(3));
        assert_eq!(entity.created_at(), Some("2024-01-01T00:00:00.000Z"));
        assert_eq!(entity.updated_at(), None);
    }

    #[test]
    fn non_string_pk_is_not_a_key() {
        let entity = Entity::new().with(PK, 42).with(SK, "PROFILE");
        assert_eq!(entity.pk(), None);
        assert_eq!(entity.key(), None);
    }

    #[test]
    fn set_path_creates_intermediate_objects() {
        let mut entity = Entity::new();
        entity.set_path("profile.contact.email", json!("a@b.co"));
        entity.set_path("profile.name", json!("Ada"));

        assert_eq!(
            Value::from(entity.clone()),
            json!({"profile": {"contact": {"email": "a@b.co"}, "name": "Ada"}})
        );
        assert_eq!(entity.get_path("profile.contact.email"), Some(&json!("a@b.co")));
        assert_eq!(entity.get_path("profile.missing.deeper"), None);
    }

    #[test]
    fn remove_path_drops_only_the_leaf() {
        let mut entity = Entity::new().with("profile", json!({"bio": "hi", "name": "Ada"}));
        assert_eq!(entity.remove_path("profile.bio"), Some(json!("hi")));
        assert_eq!(entity.remove_path("profile.bio"), None);
        assert_eq!(entity.remove_path("profile.name.first"), None);
        assert_eq!(entity.get("profile"), Some(&json!({"name": "Ada"})));
    }

    #[test]
    fn set_path_replaces_scalar_intermediate() {
        let mut entity = Entity::new().with("settings", "legacy");
        entity.set_path("settings.theme", json!("dark"));
        assert_eq!(entity.get("settings"), Some(&json!({"theme": "dark"})));
    }

    #[test]
    fn try_from_rejects_non_objects() {
        let err = Entity::try_from(json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("got array"));
    }

    #[test]
    fn serializes_transparently() {
        let entity = Entity::new().with(PK, "A").with(SK, "B");
        assert_eq!(
            serde_json::to_value(&entity).unwrap(),
            json!({"PK": "A", "SK": "B"})
        );
    }
}
