//! Key, consistency, and batch validation shared by every entity type.

use chrono::Utc;
use mm_core::entity::{CREATED_AT, ENTITY_TYPE, PK, SK, TTL, UPDATED_AT, VERSION};
use mm_core::{Entity, timestamps};
use serde_json::{Value, json};

use crate::formats::is_blank;
use crate::registry::{EntityValidator, validator_for};
use crate::report::{IssueCode, ValidationReport};

/// Store-imposed ceiling of a batch write or transaction.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 25;

/// Key shape, discriminator, version, and timestamp checks.
#[must_use]
pub fn validate_keys(entity: &Entity) -> ValidationReport {
    let mut report = ValidationReport::new();

    check_key(&mut report, entity, PK, "Partition key (PK)");
    check_key(&mut report, entity, SK, "Sort key (SK)");

    if is_blank(entity.get(ENTITY_TYPE)) {
        report.error(ENTITY_TYPE, IssueCode::Required, "Entity type is required");
    }

    match entity.get(VERSION) {
        None | Some(Value::Null) => report.error(
            VERSION,
            IssueCode::Required,
            "Version is required for optimistic locking",
        ),
        Some(v) if !v.as_f64().is_some_and(|n| n >= 0.0) => report.error(
            VERSION,
            IssueCode::TypeError,
            "Version must be a non-negative number",
        ),
        Some(_) => {}
    }

    check_timestamp(&mut report, entity, CREATED_AT, "Created timestamp");
    check_timestamp(&mut report, entity, UPDATED_AT, "Updated timestamp");

    report
}

fn check_key(report: &mut ValidationReport, entity: &Entity, attr: &str, label: &str) {
    let value = entity.get(attr);
    if is_blank(value) {
        report.error(attr, IssueCode::Required, format!("{label} is required"));
    } else if !value.is_some_and(Value::is_string) {
        report.error(attr, IssueCode::TypeError, format!("{label} must be a string"));
    }
}

fn check_timestamp(report: &mut ValidationReport, entity: &Entity, attr: &str, label: &str) {
    let value = entity.get(attr);
    if is_blank(value) {
        report.error(attr, IssueCode::Required, format!("{label} is required"));
        return;
    }
    if let Some(value) = value {
        if !value.as_str().is_some_and(timestamps::is_canonical_iso) {
            report.error_with(
                attr,
                IssueCode::InvalidFormat,
                format!("{label} must be a valid ISO date string"),
                value.clone(),
            );
        }
    }
}

/// Cross-field checks: timestamp order and TTL.
#[must_use]
pub fn validate_consistency(entity: &Entity) -> ValidationReport {
    let mut report = ValidationReport::new();

    if let (Some(created), Some(updated)) = (entity.created_at(), entity.updated_at()) {
        let parsed = (timestamps::parse_iso(created), timestamps::parse_iso(updated));
        if let (Some(c), Some(u)) = parsed {
            if c > u {
                report.error_with(
                    "timestamps",
                    IssueCode::ConsistencyError,
                    "Created timestamp cannot be after updated timestamp",
                    json!({ "createdAt": created, "updatedAt": updated }),
                );
            }
        }
    }

    if let Some(ttl) = entity.get(TTL).and_then(Value::as_f64).filter(|t| *t != 0.0) {
        #[allow(clippy::cast_precision_loss)]
        let now = Utc::now().timestamp() as f64;
        if ttl < now {
            report.warn_with(
                TTL,
                IssueCode::TtlWarning,
                "TTL is in the past, item may be deleted",
                entity.get(TTL).cloned().unwrap_or(Value::Null),
            );
        }
    }

    report
}

/// Validate a JSON batch: array shape, size bounds, and per-item keys.
#[must_use]
pub fn validate_batch(items: &Value, max_batch_size: usize) -> ValidationReport {
    let Some(items) = items.as_array() else {
        let mut report = ValidationReport::new();
        report.error("items", IssueCode::TypeError, "Items must be an array");
        return report;
    };

    let entities: Vec<Entity> = items
        .iter()
        .map(|item| Entity::try_from(item.clone()).unwrap_or_default())
        .collect();
    validate_entity_batch(&entities, max_batch_size)
}

/// Size bounds and per-item key validation for typed entities.
///
/// Per-item errors are re-addressed as `items[i].<field>` with an
/// `Item i: ` message prefix.
#[must_use]
pub fn validate_entity_batch(items: &[Entity], max_batch_size: usize) -> ValidationReport {
    let mut report = ValidationReport::new();

    if items.is_empty() {
        report.error("items", IssueCode::EmptyBatch, "Batch cannot be empty");
    }
    if items.len() > max_batch_size {
        report.error_with(
            "items",
            IssueCode::BatchSizeExceeded,
            format!("Batch size cannot exceed {max_batch_size}"),
            items.len(),
        );
    }

    for (index, item) in items.iter().enumerate() {
        for mut issue in validate_keys(item).errors {
            issue.field = format!("items[{index}].{}", issue.field);
            issue.message = format!("Item {index}: {}", issue.message);
            report.errors.push(issue);
        }
    }

    report
}

/// Keys, then consistency, then `rules`; stops at the first failing stage.
#[must_use]
pub fn validate_with(entity: &Entity, rules: Option<&dyn EntityValidator>) -> ValidationReport {
    let mut report = validate_keys(entity);
    if !report.is_valid() {
        return report;
    }

    report.merge(validate_consistency(entity));
    if !report.is_valid() {
        return report;
    }

    if let Some(rules) = rules {
        report.merge(rules.validate(entity));
    }
    report
}

/// Full validation, picking the rules from the entity's own `entityType`.
///
/// An unknown discriminator skips the entity-type stage.
#[must_use]
pub fn validate_entity(entity: &Entity) -> ValidationReport {
    validate_with(entity, entity.entity_type().map(validator_for))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ValidationIssue;
    use pretty_assertions::assert_eq;

    const T0: &str = "2024-03-01T09:00:00.000Z";
    const T1: &str = "2024-03-02T09:00:00.000Z";

    fn base() -> Entity {
        Entity::new()
            .with(PK, "USER#1")
            .with(SK, "PROFILE")
            .with(ENTITY_TYPE, "USER")
            .with(VERSION, 1)
            .with(CREATED_AT, T0)
            .with(UPDATED_AT, T1)
    }

    fn codes(report: &ValidationReport) -> Vec<(String, IssueCode)> {
        report
            .errors
            .iter()
            .map(|e| (e.field.clone(), e.code))
            .collect()
    }

    #[test]
    fn valid_keys_pass() {
        assert!(validate_keys(&base()).is_valid());
    }

    #[test]
    fn empty_entity_reports_every_required_key() {
        let report = validate_keys(&Entity::new());
        assert_eq!(
            codes(&report),
            vec![
                ("PK".into(), IssueCode::Required),
                ("SK".into(), IssueCode::Required),
                ("entityType".into(), IssueCode::Required),
                ("version".into(), IssueCode::Required),
                ("createdAt".into(), IssueCode::Required),
                ("updatedAt".into(), IssueCode::Required),
            ]
        );
        assert_eq!(report.errors[3].message, "Version is required for optimistic locking");
    }

    #[test]
    fn typed_key_errors() {
        let entity = base().with(PK, 7).with(VERSION, -1).with(CREATED_AT, "2024-03-01");
        let report = validate_keys(&entity);
        assert_eq!(
            codes(&report),
            vec![
                ("PK".into(), IssueCode::TypeError),
                ("version".into(), IssueCode::TypeError),
                ("createdAt".into(), IssueCode::InvalidFormat),
            ]
        );
        assert_eq!(report.errors[0].message, "Partition key (PK) must be a string");
        assert_eq!(report.errors[2].value, Some(json!("2024-03-01")));
    }

    #[test]
    fn string_version_is_a_type_error() {
        let report = validate_keys(&base().with(VERSION, "1"));
        assert_eq!(codes(&report), vec![("version".into(), IssueCode::TypeError)]);
    }

    #[test]
    fn created_after_updated_is_inconsistent() {
        let entity = base().with(CREATED_AT, T1).with(UPDATED_AT, T0);
        let report = validate_consistency(&entity);
        assert_eq!(
            report.errors,
            vec![ValidationIssue {
                field: "timestamps".into(),
                message: "Created timestamp cannot be after updated timestamp".into(),
                code: IssueCode::ConsistencyError,
                value: Some(json!({"createdAt": T1, "updatedAt": T0})),
            }]
        );
    }

    #[test]
    fn past_ttl_is_only_a_warning() {
        let report = validate_consistency(&base().with(TTL, 1_000));
        assert!(report.is_valid());
        assert_eq!(report.warnings[0].code, IssueCode::TtlWarning);

        let future = Utc::now().timestamp() + 3_600;
        assert!(validate_consistency(&base().with(TTL, future)).warnings.is_empty());
    }

    #[test]
    fn validation_is_idempotent() {
        let entity = base().with(TTL, 5).with(PK, json!(["x"]));
        assert_eq!(validate_keys(&entity), validate_keys(&entity));
        assert_eq!(validate_consistency(&entity), validate_consistency(&entity));
    }

    #[test]
    fn batch_rejects_non_array() {
        let report = validate_batch(&json!({"PK": "x"}), DEFAULT_MAX_BATCH_SIZE);
        assert_eq!(codes(&report), vec![("items".into(), IssueCode::TypeError)]);
        assert_eq!(report.errors[0].message, "Items must be an array");
    }

    #[test]
    fn batch_rejects_empty() {
        let report = validate_batch(&json!([]), DEFAULT_MAX_BATCH_SIZE);
        assert_eq!(codes(&report), vec![("items".into(), IssueCode::EmptyBatch)]);
    }

    #[test]
    fn batch_rejects_oversize_and_addresses_items() {
        let mut items = vec![base(); 3];
        items[1].remove(SK);
        let report = validate_entity_batch(&items, 2);

        assert_eq!(
            codes(&report),
            vec![
                ("items".into(), IssueCode::BatchSizeExceeded),
                ("items[1].SK".into(), IssueCode::Required),
            ]
        );
        assert_eq!(report.errors[0].message, "Batch size cannot exceed 2");
        assert_eq!(report.errors[0].value, Some(json!(3)));
        assert_eq!(report.errors[1].message, "Item 1: Sort key (SK) is required");
    }

    #[test]
    fn validate_entity_stops_at_first_failing_stage() {
        // Bad keys and a bad user body: only key errors are reported.
        let entity = base().with(VERSION, "x");
        let report = validate_entity(&entity);
        assert_eq!(codes(&report), vec![("version".into(), IssueCode::TypeError)]);

        // Good keys: user rules run.
        let report = validate_entity(&base());
        assert!(report.errors.iter().any(|e| e.field == "email"));
    }

    #[test]
    fn unknown_entity_type_skips_specific_rules() {
        let report = validate_entity(&base().with(ENTITY_TYPE, "LEGACY_THING"));
        assert!(report.is_valid());
    }
}
