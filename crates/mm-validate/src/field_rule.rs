//! Declarative per-field rules attached to a migration plan.

use std::fmt;
use std::sync::Arc;

use mm_core::entity::json_kind;
use mm_core::{Entity, timestamps};
use regex::Regex;
use serde_json::Value;

use crate::formats::{char_len, is_blank};
use crate::report::{IssueCode, ValidationReport};

/// Expected JSON shape of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Array,
    Object,
    /// A string that parses as a timestamp.
    Date,
}

impl FieldKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Date => "date",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Date => timestamps::parse_lenient(value).is_some(),
        }
    }
}

type CustomCheck = Arc<dyn Fn(&Value, &Entity) -> Result<(), String> + Send + Sync>;

/// Constraints on one (possibly dotted) field.
///
/// Built fluently:
///
/// ```
/// use mm_validate::{FieldKind, FieldRule};
///
/// let rule = FieldRule::new("profile.firstName")
///     .required()
///     .kind(FieldKind::String)
///     .max_length(50);
/// assert_eq!(rule.field(), "profile.firstName");
/// ```
#[derive(Clone)]
pub struct FieldRule {
    field: String,
    required: bool,
    kind: Option<FieldKind>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<Regex>,
    allowed: Vec<Value>,
    custom: Option<CustomCheck>,
}

impl FieldRule {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            required: false,
            kind: None,
            min_length: None,
            max_length: None,
            pattern: None,
            allowed: Vec::new(),
            custom: None,
        }
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub const fn kind(mut self, kind: FieldKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub const fn min_length(mut self, n: usize) -> Self {
        self.min_length = Some(n);
        self
    }

    #[must_use]
    pub const fn max_length(mut self, n: usize) -> Self {
        self.max_length = Some(n);
        self
    }

    #[must_use]
    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    #[must_use]
    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed = values.into_iter().map(Into::into).collect();
        self
    }

    /// Arbitrary check over the value and the whole record.
    #[must_use]
    pub fn custom<F>(mut self, check: F) -> Self
    where
        F: Fn(&Value, &Entity) -> Result<(), String> + Send + Sync + 'static,
    {
        self.custom = Some(Arc::new(check));
        self
    }

    fn check(&self, entity: &Entity, report: &mut ValidationReport) {
        let field = self.field.as_str();
        let value = entity.get_path(field);

        if is_blank(value) {
            if self.required {
                report.error(field, IssueCode::Required, format!("{field} is required"));
            }
            return;
        }
        let Some(value) = value else { return };

        if let Some(kind) = self.kind {
            if !kind.matches(value) {
                report.error_with(
                    field,
                    IssueCode::TypeError,
                    format!("{field} must be of type {}, got {}", kind.as_str(), json_kind(value)),
                    value.clone(),
                );
                return;
            }
        }

        let len = char_len(value).or_else(|| value.as_array().map(Vec::len));
        if let (Some(min), Some(len)) = (self.min_length, len) {
            if len < min {
                report.error_with(
                    field,
                    IssueCode::MinLength,
                    format!("{field} must be at least {min} characters"),
                    value.clone(),
                );
            }
        }
        if let (Some(max), Some(len)) = (self.max_length, len) {
            if len > max {
                report.error_with(
                    field,
                    IssueCode::MaxLength,
                    format!("{field} must be at most {max} characters"),
                    value.clone(),
                );
            }
        }

        if let Some(pattern) = &self.pattern {
            if !value.as_str().is_some_and(|s| pattern.is_match(s)) {
                report.error_with(
                    field,
                    IssueCode::InvalidFormat,
                    format!("{field} does not match the required format"),
                    value.clone(),
                );
            }
        }

        if !self.allowed.is_empty() && !self.allowed.contains(value) {
            report.error_with(
                field,
                IssueCode::InvalidValue,
                format!("{field} has an invalid value"),
                value.clone(),
            );
        }

        if let Some(custom) = &self.custom {
            if let Err(message) = custom(value, entity) {
                report.error_with(field, IssueCode::Custom, message, value.clone());
            }
        }
    }
}

impl fmt::Debug for FieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRule")
            .field("field", &self.field)
            .field("required", &self.required)
            .field("kind", &self.kind)
            .field("min_length", &self.min_length)
            .field("max_length", &self.max_length)
            .field("pattern", &self.pattern.as_ref().map(Regex::as_str))
            .field("allowed", &self.allowed)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

/// Check `entity` against every rule, in order.
#[must_use]
pub fn apply_rules(entity: &Entity, rules: &[FieldRule]) -> ValidationReport {
    let mut report = ValidationReport::new();
    for rule in rules {
        rule.check(entity, &mut report);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn codes(report: &ValidationReport) -> Vec<IssueCode> {
        report.errors.iter().map(|e| e.code).collect()
    }

    #[test]
    fn absent_optional_field_is_not_checked() {
        let rules = [FieldRule::new("bio").kind(FieldKind::String).min_length(10)];
        assert!(apply_rules(&Entity::new(), &rules).is_valid());
    }

    #[test]
    fn required_field_missing() {
        let rules = [FieldRule::new("profile.firstName").required()];
        let report = apply_rules(&Entity::new(), &rules);
        assert_eq!(codes(&report), vec![IssueCode::Required]);
        assert_eq!(report.errors[0].field, "profile.firstName");
    }

    #[test]
    fn type_mismatch_short_circuits_other_checks() {
        let rules = [FieldRule::new("age").kind(FieldKind::Number).min_length(3)];
        let report = apply_rules(&Entity::new().with("age", "old"), &rules);
        assert_eq!(codes(&report), vec![IssueCode::TypeError]);
        assert_eq!(report.errors[0].message, "age must be of type number, got string");
    }

    #[test]
    fn length_bounds_cover_strings_and_arrays() {
        let rules = [
            FieldRule::new("name").min_length(3),
            FieldRule::new("tags").max_length(2),
        ];
        let entity = Entity::new().with("name", "ab").with("tags", json!(["a", "b", "c"]));
        assert_eq!(
            codes(&apply_rules(&entity, &rules)),
            vec![IssueCode::MinLength, IssueCode::MaxLength]
        );
    }

    #[test]
    fn pattern_enum_and_custom() {
        let rules = [
            FieldRule::new("code").pattern(Regex::new("^[A-Z]{3}$").unwrap()),
            FieldRule::new("status").one_of(["active", "inactive"]),
            FieldRule::new("score").custom(|v, _| {
                if v.as_i64().is_some_and(|n| n % 2 == 0) {
                    Ok(())
                } else {
                    Err("score must be even".into())
                }
            }),
        ];
        let entity = Entity::new()
            .with("code", "abc")
            .with("status", "archived")
            .with("score", 3);
        let report = apply_rules(&entity, &rules);

        assert_eq!(
            codes(&report),
            vec![IssueCode::InvalidFormat, IssueCode::InvalidValue, IssueCode::Custom]
        );
        assert_eq!(report.errors[2].message, "score must be even");
    }

    #[test]
    fn date_kind_accepts_lenient_timestamps() {
        let rules = [FieldRule::new("joined").kind(FieldKind::Date)];
        let lenient = Entity::new().with("joined", "2024-01-05 10:00:00");
        assert!(apply_rules(&lenient, &rules).is_valid());
        assert!(!apply_rules(&Entity::new().with("joined", "yesterday"), &rules).is_valid());
    }
}
