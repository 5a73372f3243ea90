use std::path::PathBuf;

use clap::ValueEnum;

/// Shared output mode across all commands.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Raw,
}

impl From<mm_config::OutputFormat> for OutputFormat {
    fn from(format: mm_config::OutputFormat) -> Self {
        match format {
            mm_config::OutputFormat::Json => Self::Json,
            mm_config::OutputFormat::Raw => Self::Raw,
        }
    }
}

/// Global flags available before or after subcommands.
#[derive(Clone, Debug)]
pub struct GlobalFlags {
    /// `None` defers to `general.output_format`.
    pub format: Option<OutputFormat>,
    pub quiet: bool,
    pub verbose: bool,
    pub config_dir: Option<PathBuf>,
}
