//! Experience commands.

use anyhow::{Context, Result};
use tracing::info;

use eatadaki_store::{ExperienceSort, Stores};
use eatadaki_types::{NewRating, Rating, SortDirection};

use super::print_output;
use crate::cli::{ExperienceAction, OutputFormat};
use crate::format::{format_experience_detail, format_experience_list, format_rating, render};

pub async fn cmd_experience(
    action: ExperienceAction,
    stores: &Stores,
    format: OutputFormat,
) -> Result<()> {
    match action {
        ExperienceAction::Add {
            spot,
            name,
            description,
            rating,
            notes,
        } => {
            let rating = rating
                .map(|value| -> Result<NewRating> {
                    Ok(NewRating {
                        spot_id: spot,
                        rating: Rating::new(value)?,
                        notes,
                    })
                })
                .transpose()?;
            let details = stores
                .experiences
                .create(spot, name, description, rating)
                .await
                .context("Failed to log experience")?;
            print_output(&render(format, &details, format_experience_detail)?);
        }
        ExperienceAction::List { desc } => {
            let direction = if desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            let summaries = stores
                .experiences
                .fetch_all(ExperienceSort::Name(direction))
                .await?;
            print_output(&render(format, &summaries[..], format_experience_list)?);
        }
        ExperienceAction::Show { id } => {
            let details = stores
                .experiences
                .fetch(id)
                .await
                .with_context(|| format!("Failed to load experience {id}"))?;
            print_output(&render(format, &details, format_experience_detail)?);
        }
        ExperienceAction::Rate { id, rating, notes } => {
            let rating = Rating::new(rating)?;
            let entry = stores
                .experiences
                .rate(id, rating, notes)
                .await
                .with_context(|| format!("Failed to rate experience {id}"))?;
            print_output(&render(format, &entry, format_rating)?);
        }
        ExperienceAction::Delete { id } => {
            stores
                .experiences
                .delete(id)
                .await
                .with_context(|| format!("Failed to delete experience {id}"))?;
            info!("Deleted experience {}", id);
        }
    }
    Ok(())
}
