use mm_core::EntityType;
use mm_migrate::{MigrationMapping, MigrationPlan, madmall_plan};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::output::output;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub name: String,
    pub version: String,
    pub description: String,
    pub rollback_enabled: bool,
    pub entities: Vec<MappingSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingSummary {
    pub entity_type: EntityType,
    pub source: String,
    pub keys: Vec<String>,
    pub fields: Vec<FieldSummary>,
    pub rule_count: usize,
}

#[derive(Debug, Serialize)]
pub struct FieldSummary {
    pub path: String,
    /// Source column, absent for computed fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

pub fn handle(format: OutputFormat) -> anyhow::Result<()> {
    output(&summarize(&madmall_plan()), format)
}

#[must_use]
pub fn summarize(plan: &MigrationPlan) -> PlanSummary {
    PlanSummary {
        name: plan.name.clone(),
        version: plan.version.clone(),
        description: plan.description.clone(),
        rollback_enabled: plan.rollback.as_ref().is_some_and(|r| r.enabled),
        entities: plan
            .entities
            .iter()
            .map(|mapping| summarize_mapping(plan, mapping))
            .collect(),
    }
}

fn summarize_mapping(plan: &MigrationPlan, mapping: &MigrationMapping) -> MappingSummary {
    MappingSummary {
        entity_type: mapping.entity_type,
        source: mapping.source.to_string(),
        keys: mapping.key_attributes().into_iter().map(str::to_owned).collect(),
        fields: mapping
            .fields()
            .map(|(path, column)| FieldSummary {
                path: path.to_string(),
                column: column.map(str::to_owned),
            })
            .collect(),
        rule_count: plan.rules_for(mapping.entity_type).len(),
    }
}
