use std::path::PathBuf;

use clap::{Args, Subcommand};
use mm_core::EntityType;

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Migrate a SQLite database into the table snapshot.
    Migrate(MigrateArgs),
    /// Validate every entity in a JSON Lines file.
    Validate(ValidateArgs),
    /// Show tables, row counts and schemas of a SQLite database.
    Inspect(InspectArgs),
    /// Summarize the built-in migration plan.
    Plan,
}

#[derive(Clone, Debug, Args)]
pub struct MigrateArgs {
    /// SQLite file to read (defaults to `source.file_path`).
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Extract, transform and validate without writing.
    #[arg(long)]
    pub dry_run: bool,

    /// Rows per batch (defaults to `migration.batch_size`).
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Keep going after an entity type fails.
    #[arg(long)]
    pub continue_on_error: bool,

    /// Stop at the first entity type that fails.
    #[arg(long, conflicts_with = "continue_on_error")]
    pub fail_fast: bool,

    /// Copy the snapshot to `<snapshot>.bak` before writing.
    #[arg(long)]
    pub backup: bool,

    /// Only these entity types, e.g. `USER,CIRCLE`.
    #[arg(long, value_delimiter = ',', value_parser = parse_entity_type)]
    pub only: Vec<EntityType>,

    /// Table snapshot to load and save (defaults to `store.snapshot_path`).
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
}

#[derive(Clone, Debug, Args)]
pub struct ValidateArgs {
    /// JSON Lines file, one entity per line.
    pub file: PathBuf,
}

#[derive(Clone, Debug, Args)]
pub struct InspectArgs {
    /// SQLite file to read (defaults to `source.file_path`).
    #[arg(long)]
    pub source: Option<PathBuf>,
}

fn parse_entity_type(value: &str) -> Result<EntityType, String> {
    value.trim().parse().map_err(|e: mm_core::CoreError| e.to_string())
}
