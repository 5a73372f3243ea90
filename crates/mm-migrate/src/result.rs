//! Per-entity-type outcome of a migration.

use std::time::Duration;

use chrono::{DateTime, Utc};
use mm_core::EntityType;
use mm_validate::ValidationIssue;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Validation,
    Transformation,
    Write,
    Constraint,
    Extraction,
}

/// One record (or one whole entity type) that did not make it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Value>,
    pub error: String,
    #[serde(rename = "errorType")]
    pub kind: ErrorKind,
    pub timestamp: DateTime<Utc>,
    /// Structured issues of a validation failure.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ValidationIssue>,
}

impl RecordError {
    pub fn new(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            record_id: None,
            record: None,
            error: error.into(),
            kind,
            timestamp: Utc::now(),
            issues: Vec::new(),
        }
    }

    #[must_use]
    pub fn record(mut self, id: impl Into<String>, record: Value) -> Self {
        self.record_id = Some(id.into());
        self.record = Some(record);
        self
    }

    #[must_use]
    pub fn issues(mut self, issues: Vec<ValidationIssue>) -> Self {
        self.issues = issues;
        self
    }
}

/// Terminal summary of one entity type.
///
/// `processed_records == successful_records + failed_records`; skipped
/// records are counted apart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub entity_type: EntityType,
    pub total_records: u64,
    pub processed_records: u64,
    pub successful_records: u64,
    pub failed_records: u64,
    pub skipped_records: u64,
    pub errors: Vec<RecordError>,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    pub throughput: f64,
}

impl MigrationResult {
    #[must_use]
    pub const fn empty(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            total_records: 0,
            processed_records: 0,
            successful_records: 0,
            failed_records: 0,
            skipped_records: 0,
            errors: Vec::new(),
            duration_ms: 0,
            throughput: 0.0,
        }
    }

    /// Stand-in for an entity type whose migration failed outright.
    #[must_use]
    pub fn aborted(entity_type: EntityType, message: impl Into<String>) -> Self {
        Self {
            errors: vec![RecordError::new(ErrorKind::Constraint, message)],
            ..Self::empty(entity_type)
        }
    }

    /// Stamp duration and throughput from the elapsed wall time.
    pub fn finish(&mut self, elapsed: Duration) {
        self.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.throughput = rate(self.processed_records, elapsed);
    }

    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failed_records == 0 && self.errors.is_empty()
    }
}

/// Records per second, zero before any time has passed.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn rate(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { count as f64 / secs } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn aborted_result_carries_one_constraint_error() {
        let result = MigrationResult::aborted(EntityType::Story, "table stories is unavailable");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ErrorKind::Constraint);
        assert!(!result.is_clean());
    }

    #[test]
    fn finish_computes_throughput() {
        let mut result = MigrationResult::empty(EntityType::User);
        result.processed_records = 50;
        result.finish(Duration::from_millis(500));
        assert_eq!(result.duration_ms, 500);
        assert!((result.throughput - 100.0).abs() < f64::EPSILON);

        result.finish(Duration::ZERO);
        assert!(result.throughput.abs() < f64::EPSILON);
    }

    #[test]
    fn serializes_with_wire_names() {
        let error = RecordError::new(ErrorKind::Write, "throttled")
            .record("USER#1", json!({"PK": "USER#1"}));
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(value["errorType"], json!("write"));
        assert_eq!(value["recordId"], json!("USER#1"));
        assert!(value.get("issues").is_none());
    }
}
