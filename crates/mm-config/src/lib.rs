//! # mm-config
//!
//! Layered configuration loading for the MADMall data layer using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`MADMALL_*` prefix, `__` as separator)
//! 2. Project-level `.madmall/config.toml`
//! 3. User-level `~/.config/madmall/config.toml`
//! 4. Built-in defaults
//!
//! Figment maps `MADMALL_MIGRATION__BATCH_SIZE` -> `migration.batch_size`,
//! `MADMALL_SOURCE__FILE_PATH` -> `source.file_path`, and so on.
//!
//! ```no_run
//! use mm_config::MadmallConfig;
//!
//! let config = MadmallConfig::load_with_dotenv().expect("config");
//! println!("batch size: {}", config.migration.batch_size);
//! ```

mod error;
mod general;
mod migration;
mod source;
mod store;

pub use error::ConfigError;
pub use general::{GeneralConfig, OutputFormat};
pub use migration::MigrationSettings;
pub use source::{SourceConfig, SourceKind};
pub use store::StoreConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project-local configuration directory.
pub const PROJECT_DIR: &str = ".madmall";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MadmallConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub migration: MigrationSettings,
    #[serde(default)]
    pub general: GeneralConfig,
}

impl MadmallConfig {
    /// Load from defaults, both TOML files and the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Figment` on a malformed file or value, and
    /// `ConfigError::InvalidValue` when a loaded value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(PROJECT_DIR))
    }

    /// Like [`MadmallConfig::load`], reading the project file from
    /// `project_dir/config.toml`.
    ///
    /// # Errors
    ///
    /// See [`MadmallConfig::load`].
    pub fn load_from(project_dir: &Path) -> Result<Self, ConfigError> {
        let config: Self = Self::figment_in(project_dir).extract()?;
        config.migration.validate()?;
        Ok(config)
    }

    /// Load `.env` first, then everything else.
    ///
    /// # Errors
    ///
    /// See [`MadmallConfig::load`].
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        // A missing .env is normal.
        let _ = dotenvy::dotenv();
        Self::load()
    }

    /// The provider chain for the default project directory.
    #[must_use]
    pub fn figment() -> Figment {
        Self::figment_in(Path::new(PROJECT_DIR))
    }

    /// The provider chain with the project file under `project_dir`.
    #[must_use]
    pub fn figment_in(project_dir: &Path) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        let local_path = project_dir.join("config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed("MADMALL_").split("__"))
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("madmall").join("config.toml"))
    }

    /// The SQLite file to migrate from: `explicit`, else `source.file_path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotConfigured` when neither is set.
    pub fn source_path(&self, explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        if self.source.is_configured() {
            return Ok(PathBuf::from(&self.source.file_path));
        }
        Err(ConfigError::NotConfigured {
            section: "source".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_loads() {
        let config = MadmallConfig::default();
        assert!(!config.source.is_configured());
        assert_eq!(config.migration.batch_size, 25);
        assert_eq!(config.store.table_name, "madmall-data");
    }

    #[test]
    fn source_path_prefers_the_explicit_one() {
        let mut config = MadmallConfig::default();
        assert!(matches!(
            config.source_path(None),
            Err(ConfigError::NotConfigured { .. })
        ));

        config.source.file_path = "legacy.db".into();
        assert_eq!(config.source_path(None).unwrap(), PathBuf::from("legacy.db"));
        assert_eq!(
            config.source_path(Some(Path::new("other.db"))).unwrap(),
            PathBuf::from("other.db")
        );
    }
}
