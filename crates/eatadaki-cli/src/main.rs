use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod format;

use cli::{Cli, Commands, StoreCommand};
use commands::{cmd_config, cmd_experience, cmd_settings, cmd_spot, cmd_user};
use config::{Config, resolve_data_dir, resolve_format};
use eatadaki_store::Stores;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // Logs go to stderr so JSON on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?;

    let command = match cli.command {
        Commands::Config { action } => return cmd_config(action, &config_path, &config),
        Commands::Store(command) => command,
    };

    let format = resolve_format(cli.format, &config)?;
    let home = config.home()?;
    let data_dir = resolve_data_dir(cli.data_dir, &config);
    tracing::debug!("Using data directory {}", data_dir.display());

    let stores = Stores::open(&data_dir)
        .with_context(|| format!("Failed to open stores in {}", data_dir.display()))?;

    match command {
        StoreCommand::Spot { action } => cmd_spot(action, &stores, format, home).await,
        StoreCommand::Experience { action } => cmd_experience(action, &stores, format).await,
        StoreCommand::User { action } => cmd_user(action, &stores, format).await,
        StoreCommand::Settings { action } => cmd_settings(action, &stores, format).await,
    }
}
