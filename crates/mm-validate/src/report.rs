//! Validation issues and the report that collects them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::ValidationError;

/// Machine-readable issue code, serialized as `SCREAMING_SNAKE_CASE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    Required,
    TypeError,
    InvalidFormat,
    InvalidValue,
    MinLength,
    MaxLength,
    RangeError,
    ConsistencyError,
    EmptyBatch,
    BatchSizeExceeded,
    Custom,
    LengthWarning,
    TypeWarning,
    FormatWarning,
    RangeWarning,
    TtlWarning,
    Recommended,
}

impl IssueCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Required => "REQUIRED",
            Self::TypeError => "TYPE_ERROR",
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::InvalidValue => "INVALID_VALUE",
            Self::MinLength => "MIN_LENGTH",
            Self::MaxLength => "MAX_LENGTH",
            Self::RangeError => "RANGE_ERROR",
            Self::ConsistencyError => "CONSISTENCY_ERROR",
            Self::EmptyBatch => "EMPTY_BATCH",
            Self::BatchSizeExceeded => "BATCH_SIZE_EXCEEDED",
            Self::Custom => "CUSTOM",
            Self::LengthWarning => "LENGTH_WARNING",
            Self::TypeWarning => "TYPE_WARNING",
            Self::FormatWarning => "FORMAT_WARNING",
            Self::RangeWarning => "RANGE_WARNING",
            Self::TtlWarning => "TTL_WARNING",
            Self::Recommended => "RECOMMENDED",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One violation: which field, what is wrong, and the offending value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
    pub code: IssueCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Valid when no error was recorded.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(&mut self, field: impl Into<String>, code: IssueCode, message: impl Into<String>) {
        self.errors.push(issue(field, code, message, None));
    }

    pub fn error_with(
        &mut self,
        field: impl Into<String>,
        code: IssueCode,
        message: impl Into<String>,
        value: impl Into<Value>,
    ) {
        self.errors
            .push(issue(field, code, message, Some(value.into())));
    }

    pub fn warn(&mut self, field: impl Into<String>, code: IssueCode, message: impl Into<String>) {
        self.warnings.push(issue(field, code, message, None));
    }

    pub fn warn_with(
        &mut self,
        field: impl Into<String>,
        code: IssueCode,
        message: impl Into<String>,
        value: impl Into<Value>,
    ) {
        self.warnings
            .push(issue(field, code, message, Some(value.into())));
    }

    /// Append another report's issues after this one's.
    pub fn merge(&mut self, other: Self) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Error messages in report order.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }

    /// Error messages joined with `", "`.
    #[must_use]
    pub fn error_summary(&self) -> String {
        self.messages().join(", ")
    }

    /// Turn an invalid report into a [`ValidationError`].
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Failed` when the report holds any error.
    pub fn into_result(self) -> Result<Self, ValidationError> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(ValidationError::Failed {
                messages: self.messages(),
            })
        }
    }
}

fn issue(
    field: impl Into<String>,
    code: IssueCode,
    message: impl Into<String>,
    value: Option<Value>,
) -> ValidationIssue {
    ValidationIssue {
        field: field.into(),
        message: message.into(),
        code,
        value,
    }
}
