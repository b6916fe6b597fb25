//! Output formatting utilities for text and JSON output.

use std::fmt::Write as _;

use anyhow::Result;
use eatadaki_store::{ExperienceDetails, ExperienceSummary};
use eatadaki_types::{Coordinate, ExperienceRating, Spot, User};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::cli::OutputFormat;

/// A spot with its distance from a reference point, for listings.
#[derive(Debug, Serialize)]
pub struct SpotRow<'a> {
    #[serde(flatten)]
    pub spot: &'a Spot,
    /// Meters from the reference point
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
}

impl<'a> SpotRow<'a> {
    pub fn new(spot: &'a Spot, from: Option<Coordinate>) -> Self {
        Self {
            spot,
            distance_m: from.map(|from| from.distance_to(&spot.coordinate)),
        }
    }
}

/// Render `value` as pretty JSON or with the given text formatter.
pub fn render<T, F>(format: OutputFormat, value: &T, text: F) -> Result<String>
where
    T: Serialize + ?Sized,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Text => Ok(text(value)),
    }
}

/// RFC 3339 timestamp, or the debug form if formatting fails.
pub fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| ts.to_string())
}

/// Human-readable distance.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{:.0} m", meters)
    } else {
        format!("{:.1} km", meters / 1000.0)
    }
}

pub fn format_spot_rows(rows: &[SpotRow<'_>]) -> String {
    if rows.is_empty() {
        return "No spots found.\n".to_string();
    }

    let mut out = String::new();
    for row in rows {
        let spot = row.spot;
        let _ = write!(out, "{}  {:<24}  {}", spot.id, spot.name, spot.coordinate);
        if let Some(distance) = row.distance_m {
            let _ = write!(out, "  {}", format_distance(distance));
        }
        out.push('\n');
    }
    out
}

pub fn format_spot_detail(spot: &Spot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", spot.name);
    let _ = writeln!(out, "  Id:              {}", spot.id);
    let _ = writeln!(out, "  Location:        {}", spot.coordinate);
    if let Some(map_provider_id) = &spot.map_provider_id {
        let _ = writeln!(out, "  Map provider id: {}", map_provider_id);
    }
    if let Some(remote_id) = &spot.remote_id {
        let _ = writeln!(out, "  Remote id:       {}", remote_id);
    }
    let _ = writeln!(out, "  Added:           {} ({})", format_timestamp(spot.created_at), spot.reason);
    out
}

pub fn format_experience_list(summaries: &[ExperienceSummary]) -> String {
    if summaries.is_empty() {
        return "No experiences logged.\n".to_string();
    }

    let mut out = String::new();
    for summary in summaries {
        let _ = writeln!(
            out,
            "{}  {:<24}  at {}",
            summary.experience.id, summary.experience.name, summary.spot.name
        );
    }
    out
}

fn format_rating_line(rating: &ExperienceRating) -> String {
    let mut line = format!("{}  {}", format_timestamp(rating.created_at), rating.rating);
    if let Some(notes) = &rating.notes {
        let _ = write!(line, "  {}", notes);
    }
    line
}

pub fn format_experience_detail(details: &ExperienceDetails) -> String {
    let experience = &details.experience;
    let mut out = String::new();
    let _ = writeln!(out, "{}", experience.name);
    let _ = writeln!(out, "  Id:     {}", experience.id);
    let _ = writeln!(out, "  Spot:   {} ({})", details.spot.name, details.spot.id);
    let _ = writeln!(out, "  Logged: {}", format_timestamp(experience.created_at));
    if let Some(description) = &experience.description {
        let _ = writeln!(out, "  {}", description);
    }

    if details.ratings.is_empty() {
        out.push_str("  Not rated yet\n");
    } else {
        if let Some(average) = details.average_stars() {
            let _ = writeln!(out, "  Average: {:.1}/5 over {} ratings", average, details.ratings.len());
        }
        for rating in &details.ratings {
            let _ = writeln!(out, "    {}", format_rating_line(rating));
        }
    }
    out
}

pub fn format_rating(rating: &ExperienceRating) -> String {
    format!("Rated {}\n", format_rating_line(rating))
}

pub fn format_user(user: &Option<User>) -> String {
    match user {
        Some(user) => format!(
            "{} ({}), signed in {}\n",
            user.email,
            user.id,
            format_timestamp(user.created_at)
        ),
        None => "Not signed in.\n".to_string(),
    }
}
