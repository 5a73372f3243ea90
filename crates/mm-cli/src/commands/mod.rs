use mm_config::MadmallConfig;

use crate::cli::{Commands, GlobalFlags, OutputFormat};

pub mod inspect;
pub mod migrate;
pub mod plan;
pub mod validate;

/// Load configuration, honouring `--config-dir`.
pub fn load_config(flags: &GlobalFlags) -> anyhow::Result<MadmallConfig> {
    let config = match &flags.config_dir {
        Some(dir) => MadmallConfig::load_from(dir)?,
        None => MadmallConfig::load_with_dotenv()?,
    };
    Ok(config)
}

/// `--format`, else `general.output_format`.
#[must_use]
pub fn output_format(flags: &GlobalFlags, config: &MadmallConfig) -> OutputFormat {
    flags.format.unwrap_or_else(|| config.general.output_format.into())
}

pub async fn dispatch(
    command: Commands,
    config: &MadmallConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let format = output_format(flags, config);
    match command {
        Commands::Migrate(args) => migrate::handle(&args, config, format).await,
        Commands::Validate(args) => validate::handle(&args, format),
        Commands::Inspect(args) => inspect::handle(&args, config, format).await,
        Commands::Plan => plan::handle(format),
    }
}
