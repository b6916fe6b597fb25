//! Spot commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use futures::StreamExt;
use geo::{Rect, coord};
use tracing::{debug, info};

use eatadaki_store::{
    FinderError, FixedLocation, LocationProvider, NoLocation, SpotFinder, SpotKeys, SpotQuery,
    SpotSearch, Stores,
};
use eatadaki_types::{Coordinate, CreationReason, FoundSpot, SortDirection, Spot};

use super::print_output;
use crate::cli::{ListArgs, OutputFormat, SpotAction, SpotSortKey};
use crate::format::{SpotRow, format_spot_detail, format_spot_rows, render};

/// Execute a spot subcommand.
pub async fn cmd_spot(
    action: SpotAction,
    stores: &Stores,
    format: OutputFormat,
    home: Option<Coordinate>,
) -> Result<()> {
    match action {
        SpotAction::Add {
            name,
            at,
            map_provider_id,
            remote_id,
        } => {
            let mut spot = Spot::new(name, at, CreationReason::Manual);
            spot.map_provider_id = map_provider_id;
            spot.remote_id = remote_id;
            let spot = stores.spots.create(spot).await.context("Failed to add spot")?;
            print_output(&render(format, &spot, format_spot_detail)?);
        }
        SpotAction::List { list } => {
            let (query, from) = build_query(&list, home)?;
            let spots = stores.spots.fetch_all(&query).await?;
            print_spots(&spots, from, format)?;
        }
        SpotAction::Show {
            id,
            map_provider_id,
        } => {
            let keys = SpotKeys {
                id,
                map_provider_id,
                remote_id: None,
            };
            let spot = stores
                .spots
                .fetch_any_of(&keys)
                .await
                .context("Failed to look up spot")?;
            print_output(&render(format, &spot, format_spot_detail)?);
        }
        SpotAction::Delete { id } => {
            stores
                .spots
                .delete(id)
                .await
                .with_context(|| format!("Failed to delete spot {id}"))?;
            info!("Deleted spot {}", id);
        }
        SpotAction::Near { at, span } => {
            let center = at
                .or(home)
                .context("No --at given and no [home] set in config")?;
            near(stores, center, span, format).await?;
        }
        SpotAction::Watch { list, count } => {
            let (query, from) = build_query(&list, home)?;
            watch(stores, query, from, count, format).await?;
        }
        SpotAction::Search { query, from } => {
            let location: Arc<dyn LocationProvider> = match home {
                Some(home) => Arc::new(FixedLocation(home)),
                None => Arc::new(NoLocation),
            };
            let search = SpotSearch::new(
                Arc::new(JsonFileFinder { path: from }),
                location,
                stores.device_config.clone(),
                stores.spots.clone(),
            );
            let spots = search.search(&query).await.context("Search failed")?;
            print_spots(&spots, None, format)?;
        }
    }
    Ok(())
}

fn build_query(list: &ListArgs, home: Option<Coordinate>) -> Result<(SpotQuery, Option<Coordinate>)> {
    let direction = if list.desc {
        SortDirection::Descending
    } else {
        SortDirection::Ascending
    };

    let mut query = match list.sort {
        SpotSortKey::Name => SpotQuery::new().by_name(direction),
        SpotSortKey::Distance => {
            let from = list
                .from
                .or(home)
                .context("Distance sort needs --from or [home] in config")?;
            SpotQuery::new().by_distance(from, direction)
        }
    };
    if let Some(search) = &list.search {
        query = query.search(search.clone());
    }

    // Show distances whenever a reference point is known.
    Ok((query, list.from.or(home)))
}

fn print_spots(spots: &[Spot], from: Option<Coordinate>, format: OutputFormat) -> Result<()> {
    let rows: Vec<SpotRow<'_>> = spots.iter().map(|spot| SpotRow::new(spot, from)).collect();
    print_output(&render(format, &rows[..], format_spot_rows)?);
    Ok(())
}

async fn near(stores: &Stores, center: Coordinate, span: f64, format: OutputFormat) -> Result<()> {
    if !(span.is_finite() && span > 0.0) {
        bail!("--span must be a positive number of degrees");
    }
    let bounds = Rect::new(
        coord! { x: center.longitude - span, y: center.latitude - span },
        coord! { x: center.longitude + span, y: center.latitude + span },
    );
    debug!(?bounds, "Looking up spots in box");

    let mut spots = Vec::new();
    for id in stores.spots.fetch_ids_in(&bounds).await? {
        spots.push(stores.spots.fetch(id).await?);
    }
    print_spots(&spots, Some(center), format)
}

async fn watch(
    stores: &Stores,
    query: SpotQuery,
    from: Option<Coordinate>,
    count: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let mut observation = stores.spots.observe(query).await;
    let mut seen = 0usize;

    loop {
        if count.is_some_and(|count| seen >= count) {
            break;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Stopped watching.");
                break;
            }
            next = observation.next() => {
                let Some(spots) = next else { break };
                let spots = spots?;
                if format == OutputFormat::Text && seen > 0 {
                    println!("---");
                }
                print_spots(&spots, from, format)?;
                seen += 1;
            }
        }
    }

    observation.close();
    Ok(())
}

/// Map search backed by a JSON file holding an array of results.
///
/// Hits are names containing the query, ignoring case, nearest first when a
/// location is given.
struct JsonFileFinder {
    path: PathBuf,
}

#[async_trait]
impl SpotFinder for JsonFileFinder {
    async fn find_spots(
        &self,
        query: &str,
        near: Option<Coordinate>,
    ) -> Result<Vec<FoundSpot>, FinderError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let results: Vec<FoundSpot> = serde_json::from_str(&content)?;

        let needle = query.trim().to_lowercase();
        let mut hits: Vec<FoundSpot> = results
            .into_iter()
            .filter(|found| found.name.to_lowercase().contains(&needle))
            .collect();
        if let Some(near) = near {
            hits.sort_by(|a, b| {
                near.distance_to(&a.coordinate)
                    .total_cmp(&near.distance_to(&b.coordinate))
            });
        }
        Ok(hits)
    }
}
