use anyhow::Result;
use clap::Parser;

use tibu_host::presentation::cli::Cli;
use tibu_host::presentation::commands;
use tibu_infrastructure::config::HostConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => HostConfig::default_path()?,
    };
    let mut config = HostConfig::load(&config_path)?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    match tibu_infrastructure::logging::init_logger(&config.log_dir, config.log_level) {
        Ok(_) => {
            tracing::info!("🚀 tibu-host starting...");
            tracing::info!("📝 File logging initialized at: {}", config.log_dir.display());
        }
        Err(e) => {
            eprintln!("⚠️  Failed to initialize file logging: {}", e);
            eprintln!("   Falling back to console logging only");

            let _ = tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                        tracing_subscriber::EnvFilter::new(config.log_level.as_str())
                    }),
                )
                .with_target(true)
                .with_line_number(true)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }

    commands::execute(cli.command, &config).await
}
