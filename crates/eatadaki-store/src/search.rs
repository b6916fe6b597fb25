//! Search-and-cache flow.
//!
//! Map search and device location are provided from outside through the
//! [`SpotFinder`] and [`LocationProvider`] traits. [`SpotSearch`] wires them
//! to the local stores: it only asks for the device location when the user
//! opted into location services, and every hit is cached as a spot.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use eatadaki_types::{Coordinate, FoundSpot, Spot};

use crate::device_config::DeviceConfigurationController;
use crate::error::SearchError;
use crate::spots::SpotRepository;

/// Error type returned by finder implementations.
pub type FinderError = Box<dyn std::error::Error + Send + Sync>;

/// A source of spots matching a free-text query, such as a map provider.
#[async_trait]
pub trait SpotFinder: Send + Sync {
    /// Find spots matching `query`, biased towards `near` when given.
    async fn find_spots(
        &self,
        query: &str,
        near: Option<Coordinate>,
    ) -> Result<Vec<FoundSpot>, FinderError>;
}

/// A source for the device's current position.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// The current position, if known.
    async fn current_location(&self) -> Option<Coordinate>;
}

/// A location provider that always reports the same position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedLocation(pub Coordinate);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_location(&self) -> Option<Coordinate> {
        Some(self.0)
    }
}

/// A location provider that never knows where it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn current_location(&self) -> Option<Coordinate> {
        None
    }
}

/// Runs searches and caches their results.
///
/// The opt-in check and the cache write touch different stores and are
/// not atomic with each other.
#[derive(Clone)]
pub struct SpotSearch {
    finder: Arc<dyn SpotFinder>,
    location: Arc<dyn LocationProvider>,
    config: DeviceConfigurationController,
    spots: SpotRepository,
}

impl SpotSearch {
    /// Combine a finder and a location source with the local stores.
    pub fn new(
        finder: Arc<dyn SpotFinder>,
        location: Arc<dyn LocationProvider>,
        config: DeviceConfigurationController,
        spots: SpotRepository,
    ) -> Self {
        Self {
            finder,
            location,
            config,
            spots,
        }
    }

    /// Search for `query` and store the results, returning the stored spots
    /// in the order the finder reported them.
    pub async fn search(&self, query: &str) -> Result<Vec<Spot>, SearchError> {
        let near = if self.config.opted_into_location_services().await? {
            self.location.current_location().await
        } else {
            None
        };

        debug!(query, ?near, "Searching for spots");
        let found = self
            .finder
            .find_spots(query, near)
            .await
            .map_err(SearchError::Finder)?;

        let stored = self.spots.cache_search_results(&found).await?;
        info!("Cached {} spots for '{}'", stored.len(), query);
        Ok(stored)
    }
}
