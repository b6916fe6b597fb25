//! User commands.

use anyhow::{Context, Result, bail};
use tracing::info;

use eatadaki_store::Stores;
use eatadaki_types::User;

use super::print_output;
use crate::cli::{OutputFormat, UserAction};
use crate::format::{format_user, render};

pub async fn cmd_user(action: UserAction, stores: &Stores, format: OutputFormat) -> Result<()> {
    match action {
        UserAction::Show => {
            let user = stores.user.fetch().await?;
            print_output(&render(format, &user, format_user)?);
        }
        UserAction::Login { email } => {
            let email = email.trim();
            if email.is_empty() {
                bail!("Email must not be empty");
            }
            let user = stores
                .user
                .save(User::new(email))
                .await
                .context("Failed to save user")?;
            print_output(&render(format, &Some(user), format_user)?);
        }
        UserAction::Logout => {
            stores.user.clear().await.context("Failed to sign out")?;
            info!("Signed out");
        }
    }
    Ok(())
}
