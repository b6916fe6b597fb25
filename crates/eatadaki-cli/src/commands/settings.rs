//! Device settings commands.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use serde::Serialize;

use eatadaki_store::Stores;

use super::print_output;
use crate::cli::{OutputFormat, SettingsAction, Toggle};
use crate::format::render;

#[derive(Debug, Serialize)]
struct LocationSetting {
    opted_into_location_services: bool,
}

pub async fn cmd_settings(
    action: SettingsAction,
    stores: &Stores,
    format: OutputFormat,
) -> Result<()> {
    let config = &stores.device_config;
    match action {
        SettingsAction::Show => {
            let entries: Vec<(String, String)> = config
                .entries()
                .await?
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect();
            let output = render(format, &entries[..], |entries| {
                if entries.is_empty() {
                    return "No settings stored.\n".to_string();
                }
                let mut out = String::new();
                for (key, value) in entries {
                    let _ = writeln!(out, "{key} = {value}");
                }
                out
            })?;
            print_output(&output);
        }
        SettingsAction::Location { value } => {
            if let Some(value) = value {
                config
                    .set_opted_into_location_services(value == Toggle::On)
                    .await
                    .context("Failed to update location setting")?;
            }
            let setting = LocationSetting {
                opted_into_location_services: config.opted_into_location_services().await?,
            };
            let output = render(format, &setting, |s| {
                let state = if s.opted_into_location_services { "on" } else { "off" };
                format!("Location services: {state}\n")
            })?;
            print_output(&output);
        }
    }
    Ok(())
}
