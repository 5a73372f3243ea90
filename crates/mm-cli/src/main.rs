use clap::Parser;

mod cli;
mod commands;
mod output;
mod progress;
mod ui;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("mmctl error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let flags = cli.global_flags();
    let config = commands::load_config(&flags)?;
    init_tracing(&flags, &config.migration.log_level)?;
    ui::init(&flags);

    commands::dispatch(cli.command, &config, &flags).await
}

/// `MADMALL_LOG` wins; otherwise `warn`, with the engine at `migration.log_level`.
fn init_tracing(flags: &cli::GlobalFlags, engine_level: &str) -> anyhow::Result<()> {
    let directives = if flags.quiet {
        "error".to_string()
    } else if flags.verbose {
        "debug".to_string()
    } else {
        format!("warn,mm_migrate={engine_level}")
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("MADMALL_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(directives));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
