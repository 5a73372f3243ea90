use std::path::Path;

use anyhow::Context;
use mm_core::Entity;
use mm_validate::{IssueCode, ValidationIssue, validate_entity};
use serde::Serialize;
use serde_json::Value;

use crate::cli::{OutputFormat, ValidateArgs};
use crate::output::output;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReport {
    /// 1-based line in the input file.
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

#[derive(Debug, Serialize)]
pub struct FileReport {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub entities: Vec<EntityReport>,
}

pub fn handle(args: &ValidateArgs, format: OutputFormat) -> anyhow::Result<()> {
    let report = validate_file(&args.file)?;
    output(&report, format)?;
    anyhow::ensure!(
        report.invalid == 0,
        "{} of {} entities failed validation",
        report.invalid,
        report.total
    );
    Ok(())
}

/// Validate every line of a JSON Lines file. Lines that are not objects
/// are reported as invalid rather than aborting the run.
pub fn validate_file(path: &Path) -> anyhow::Result<FileReport> {
    let lines = serde_jsonlines::json_lines::<Value, _>(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut entities = Vec::new();
    for (index, line) in lines.enumerate() {
        let value =
            line.with_context(|| format!("{}:{}: malformed JSON", path.display(), index + 1))?;
        entities.push(validate_value(index + 1, value));
    }

    let valid = entities.iter().filter(|e| e.valid).count();
    Ok(FileReport {
        total: entities.len(),
        valid,
        invalid: entities.len() - valid,
        entities,
    })
}

fn validate_value(line: usize, value: Value) -> EntityReport {
    let entity = match Entity::try_from(value) {
        Ok(entity) => entity,
        Err(e) => {
            return EntityReport {
                line,
                pk: None,
                sk: None,
                entity_type: None,
                valid: false,
                errors: vec![ValidationIssue {
                    field: "entity".into(),
                    message: e.to_string(),
                    code: IssueCode::TypeError,
                    value: None,
                }],
                warnings: Vec::new(),
            };
        }
    };

    let report = validate_entity(&entity);
    EntityReport {
        line,
        pk: entity.pk().map(str::to_owned),
        sk: entity.sk().map(str::to_owned),
        entity_type: entity.entity_type_tag().map(str::to_owned),
        valid: report.is_valid(),
        errors: report.errors,
        warnings: report.warnings,
    }
}
