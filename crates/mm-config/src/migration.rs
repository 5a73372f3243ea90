//! Migration run defaults.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

const fn default_batch_size() -> usize {
    25
}

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MigrationSettings {
    /// Rows extracted per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(default = "default_true")]
    pub validate_data: bool,

    #[serde(default)]
    pub backup_before_migration: bool,

    #[serde(default = "default_true")]
    pub continue_on_error: bool,

    /// Default tracing filter when `MADMALL_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            dry_run: false,
            validate_data: true,
            backup_before_migration: false,
            continue_on_error: true,
            log_level: default_log_level(),
        }
    }
}

impl MigrationSettings {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when `batch_size` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "migration.batch_size".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = MigrationSettings::default();
        assert_eq!(config.batch_size, 25);
        assert!(!config.dry_run);
        assert!(config.validate_data);
        assert!(!config.backup_before_migration);
        assert!(config.continue_on_error);
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_batch_size_is_invalid() {
        let config = MigrationSettings {
            batch_size: 0,
            ..MigrationSettings::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration value for 'migration.batch_size': must be greater than zero"
        );
    }
}
