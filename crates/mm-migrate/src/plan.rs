//! Migration plans: ordered mappings plus rule sets and hooks.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use mm_core::EntityType;
use mm_core::entity::{PK, SK};
use mm_validate::FieldRule;

use crate::error::MigrationError;
use crate::mapping::MigrationMapping;

/// An async callback run once around the entity migrations.
#[async_trait]
pub trait PlanHook: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> anyhow::Result<()>;
}

/// Declarative rollback descriptor. Never executed by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackPlan {
    pub enabled: bool,
    pub backup_location: Option<String>,
}

#[derive(Clone, Default)]
pub struct MigrationPlan {
    pub name: String,
    pub description: String,
    pub version: String,
    pub dependencies: Vec<String>,
    /// Migrated strictly in this order.
    pub entities: Vec<MigrationMapping>,
    pub validation_rules: BTreeMap<EntityType, Vec<FieldRule>>,
    pub pre_hooks: Vec<Arc<dyn PlanHook>>,
    pub post_hooks: Vec<Arc<dyn PlanHook>>,
    pub rollback: Option<RollbackPlan>,
}

impl MigrationPlan {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn entity(mut self, mapping: MigrationMapping) -> Self {
        self.entities.push(mapping);
        self
    }

    #[must_use]
    pub fn rules(mut self, entity_type: EntityType, rules: Vec<FieldRule>) -> Self {
        self.validation_rules.insert(entity_type, rules);
        self
    }

    #[must_use]
    pub fn pre_hook(mut self, hook: Arc<dyn PlanHook>) -> Self {
        self.pre_hooks.push(hook);
        self
    }

    #[must_use]
    pub fn post_hook(mut self, hook: Arc<dyn PlanHook>) -> Self {
        self.post_hooks.push(hook);
        self
    }

    #[must_use]
    pub fn rollback(mut self, rollback: RollbackPlan) -> Self {
        self.rollback = Some(rollback);
        self
    }

    /// Field rules for `entity_type`; empty when none are declared.
    #[must_use]
    pub fn rules_for(&self, entity_type: EntityType) -> &[FieldRule] {
        self.validation_rules.get(&entity_type).map_or(&[], Vec::as_slice)
    }

    /// Keep only the mappings whose entity type is in `only`.
    #[must_use]
    pub fn restricted_to(mut self, only: &[EntityType]) -> Self {
        self.entities.retain(|m| only.contains(&m.entity_type));
        self
    }

    /// Every mapping must produce `PK` and `SK`, and an entity type may
    /// appear only once.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::InvalidPlan` naming the first offence.
    pub fn validate(&self) -> Result<(), MigrationError> {
        let mut seen = BTreeSet::new();
        for mapping in &self.entities {
            if !seen.insert(mapping.entity_type) {
                return Err(MigrationError::InvalidPlan(format!(
                    "{} is mapped more than once",
                    mapping.entity_type
                )));
            }
            let keys = mapping.key_attributes();
            for required in [PK, SK] {
                if !keys.contains(&required) {
                    return Err(MigrationError::InvalidPlan(format!(
                        "mapping for {} has no {required} mapping",
                        mapping.entity_type
                    )));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for MigrationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationPlan")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("entities", &self.entities)
            .field("validation_rules", &self.validation_rules)
            .field("pre_hooks", &self.pre_hooks.len())
            .field("post_hooks", &self.post_hooks.len())
            .field("rollback", &self.rollback)
            .finish_non_exhaustive()
    }
}
