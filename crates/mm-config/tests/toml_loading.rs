//! Layered loading from TOML files and the environment.
//!
//! Uses `figment::Jail` for a sandboxed working directory and environment.

use figment::Jail;
use mm_config::{ConfigError, MadmallConfig, OutputFormat};
use pretty_assertions::assert_eq;

/// Point the user-global layer into the jail.
fn isolate(jail: &mut Jail) {
    let xdg = jail.directory().join("xdg");
    jail.set_env("XDG_CONFIG_HOME", xdg.display());
}

#[test]
fn defaults_without_any_files() {
    Jail::expect_with(|jail| {
        isolate(jail);
        let config = MadmallConfig::load().expect("config loads");
        assert_eq!(config.store.snapshot_path, ".madmall/table.jsonl");
        assert_eq!(config.migration.batch_size, 25);
        assert!(config.migration.continue_on_error);
        assert_eq!(config.general.output_format, OutputFormat::Json);
        Ok(())
    });
}

#[test]
fn project_file_overrides_defaults() {
    Jail::expect_with(|jail| {
        isolate(jail);
        jail.create_dir(".madmall")?;
        jail.create_file(
            ".madmall/config.toml",
            r#"
[source]
kind = "sqlite"
file_path = "legacy/madmall.db"

[migration]
batch_size = 10
dry_run = true
continue_on_error = false

[general]
output_format = "raw"
"#,
        )?;

        let config = MadmallConfig::load().expect("config loads");
        assert_eq!(config.source.file_path, "legacy/madmall.db");
        assert_eq!(config.migration.batch_size, 10);
        assert!(config.migration.dry_run);
        assert!(!config.migration.continue_on_error);
        assert!(config.migration.validate_data);
        assert_eq!(config.general.output_format, OutputFormat::Raw);
        Ok(())
    });
}

#[test]
fn project_file_beats_user_file() {
    Jail::expect_with(|jail| {
        isolate(jail);
        jail.create_dir("xdg/madmall")?;
        jail.create_file(
            "xdg/madmall/config.toml",
            "[store]\ntable_name = \"from-user\"\nsnapshot_path = \"user.jsonl\"\n",
        )?;
        jail.create_dir(".madmall")?;
        jail.create_file(".madmall/config.toml", "[store]\ntable_name = \"from-project\"\n")?;

        let config = MadmallConfig::load().expect("config loads");
        assert_eq!(config.store.table_name, "from-project");
        assert_eq!(config.store.snapshot_path, "user.jsonl");
        Ok(())
    });
}

#[test]
fn env_beats_files() {
    Jail::expect_with(|jail| {
        isolate(jail);
        jail.create_dir(".madmall")?;
        jail.create_file(".madmall/config.toml", "[migration]\nbatch_size = 10\n")?;
        jail.set_env("MADMALL_MIGRATION__BATCH_SIZE", "50");
        jail.set_env("MADMALL_SOURCE__FILE_PATH", "env.db");

        let config = MadmallConfig::load().expect("config loads");
        assert_eq!(config.migration.batch_size, 50);
        assert_eq!(config.source.file_path, "env.db");
        Ok(())
    });
}

#[test]
fn custom_project_dir() {
    Jail::expect_with(|jail| {
        isolate(jail);
        jail.create_dir("conf")?;
        jail.create_file("conf/config.toml", "[migration]\nvalidate_data = false\n")?;

        let config =
            MadmallConfig::load_from(&jail.directory().join("conf")).expect("config loads");
        assert!(!config.migration.validate_data);
        Ok(())
    });
}

#[test]
fn zero_batch_size_is_rejected() {
    Jail::expect_with(|jail| {
        isolate(jail);
        jail.set_env("MADMALL_MIGRATION__BATCH_SIZE", "0");
        let err = MadmallConfig::load().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref field, .. } if field == "migration.batch_size"
        ));
        Ok(())
    });
}

#[test]
fn malformed_value_is_a_figment_error() {
    Jail::expect_with(|jail| {
        isolate(jail);
        jail.set_env("MADMALL_MIGRATION__DRY_RUN", "sometimes");
        assert!(matches!(MadmallConfig::load(), Err(ConfigError::Figment(_))));
        Ok(())
    });
}

#[test]
fn dotenv_values_flow_through_the_env_layer() {
    Jail::expect_with(|jail| {
        isolate(jail);
        jail.create_file(".env", "MADMALL_STORE__TABLE_NAME=from-dotenv\n")?;

        let config = MadmallConfig::load_with_dotenv().expect("config loads");
        assert_eq!(config.store.table_name, "from-dotenv");
        Ok(())
    });
}
