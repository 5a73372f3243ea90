use std::path::PathBuf;

use clap::Parser;

pub mod global;
pub mod root_commands;

pub use global::{GlobalFlags, OutputFormat};
pub use root_commands::{Commands, InspectArgs, MigrateArgs, ValidateArgs};

/// Top-level CLI parser for the `mmctl` binary.
#[derive(Debug, Parser)]
#[command(name = "mmctl", version, about = "MADMall data layer tooling")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: json, raw (defaults to `general.output_format`)
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,

    /// Quiet mode (errors only, no progress bars)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding the project `config.toml` (defaults to `.madmall`)
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,
}

impl Cli {
    #[must_use]
    pub fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
            quiet: self.quiet,
            verbose: self.verbose,
            config_dir: self.config_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use mm_core::EntityType;
    use pretty_assertions::assert_eq;

    use super::{Cli, Commands, OutputFormat};

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["mmctl", "plan", "--format", "raw", "--quiet"])
            .expect("cli should parse");
        assert_eq!(cli.format, Some(OutputFormat::Raw));
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Plan));
    }

    #[test]
    fn migrate_flags() {
        let cli = Cli::try_parse_from([
            "mmctl",
            "migrate",
            "--source",
            "legacy.db",
            "--dry-run",
            "--batch-size",
            "10",
            "--only",
            "USER,circle",
        ])
        .expect("cli should parse");

        let Commands::Migrate(args) = cli.command else {
            panic!("expected migrate");
        };
        assert!(args.dry_run);
        assert_eq!(args.batch_size, Some(10));
        assert_eq!(args.only, vec![EntityType::User, EntityType::Circle]);
        assert_eq!(args.source.as_deref(), Some(std::path::Path::new("legacy.db")));
    }

    #[test]
    fn unknown_entity_type_is_rejected() {
        assert!(Cli::try_parse_from(["mmctl", "migrate", "--only", "WIDGET"]).is_err());
    }

    #[test]
    fn fail_fast_conflicts_with_continue() {
        let args = ["mmctl", "migrate", "--fail-fast", "--continue-on-error"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn output_format_rejects_table() {
        assert!(Cli::try_parse_from(["mmctl", "--format", "table", "plan"]).is_err());
    }
}
