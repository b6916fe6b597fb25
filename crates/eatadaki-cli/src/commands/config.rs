//! Config file commands.

use std::path::Path;

use anyhow::{Result, bail};

use super::print_output;
use crate::cli::ConfigAction;
use crate::config::Config;

/// Handle config subcommands. These never open the stores.
pub fn cmd_config(action: ConfigAction, path: &Path, config: &Config) -> Result<()> {
    match action {
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Show => {
            let content = toml::to_string_pretty(config)?;
            if content.trim().is_empty() {
                println!("# {} (empty or missing)", path.display());
            } else {
                print_output(&content);
            }
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "Config file already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            Config::default().save(path)?;
            eprintln!("Wrote {}", path.display());
        }
    }
    Ok(())
}
