//! Query builders for spot and experience listings.
//!
//! [`SpotQuery`] follows the builder pattern and describes both the order of
//! the results and an optional case-insensitive name filter. Ordering is
//! stable everywhere: spots that compare equal keep their insertion order.
//!
//! # Example
//!
//! ```
//! use eatadaki_store::SpotQuery;
//! use eatadaki_types::{Coordinate, SortDirection};
//!
//! // Closest ramen first
//! let query = SpotQuery::new()
//!     .by_distance(Coordinate::new(35.68, 139.76), SortDirection::Ascending)
//!     .search("ramen");
//! assert_eq!(query.search_term(), Some("ramen".to_string()));
//! ```

use eatadaki_types::{Coordinate, SortDirection, Spot};
use uuid::Uuid;

/// Order of a spot listing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpotSort {
    /// Lexicographic by name.
    Name(SortDirection),
    /// By great-circle distance from `from`.
    Distance {
        from: Coordinate,
        direction: SortDirection,
    },
}

impl Default for SpotSort {
    fn default() -> Self {
        SpotSort::Name(SortDirection::Ascending)
    }
}

/// Fluent query builder for spot listings.
///
/// By default spots are sorted by name ascending and not filtered.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SpotQuery {
    /// Result order.
    pub sort: SpotSort,
    /// Case-insensitive substring the name must contain.
    pub search: Option<String>,
}

impl SpotQuery {
    /// Create a new query with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sort by name.
    pub fn by_name(mut self, direction: SortDirection) -> Self {
        self.sort = SpotSort::Name(direction);
        self
    }

    /// Sort by distance from `from`.
    pub fn by_distance(mut self, from: Coordinate, direction: SortDirection) -> Self {
        self.sort = SpotSort::Distance { from, direction };
        self
    }

    /// Keep only spots whose name contains `term`, ignoring case.
    ///
    /// An empty or whitespace-only term disables filtering.
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// The normalized (trimmed, lowercased) search term, if filtering applies.
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }

    /// Whether `spot` passes the name filter.
    pub fn matches(&self, spot: &Spot) -> bool {
        match self.search_term() {
            Some(term) => spot.name.to_lowercase().contains(&term),
            None => true,
        }
    }

    /// `ORDER BY` clause used when loading rows for this query.
    ///
    /// Distance ordering happens in memory, so rows are loaded in insertion
    /// order and sorted stably afterwards.
    pub(crate) fn order_clause(&self) -> String {
        match self.sort {
            SpotSort::Name(direction) => {
                format!("ORDER BY name COLLATE BINARY {}, pk ASC", direction.as_sql())
            }
            SpotSort::Distance { .. } => "ORDER BY pk ASC".to_string(),
        }
    }

    /// Filter and order spots that were loaded with [`order_clause`](Self::order_clause).
    pub(crate) fn apply(&self, spots: Vec<Spot>) -> Vec<Spot> {
        let term = self.search_term();
        let filtered = spots.into_iter().filter(|spot| match &term {
            Some(term) => spot.name.to_lowercase().contains(term),
            None => true,
        });

        match self.sort {
            SpotSort::Name(_) => filtered.collect(),
            SpotSort::Distance { from, direction } => sort_by_distance(filtered, from, direction),
        }
    }
}

/// Stable sort by haversine distance from `from`.
pub(crate) fn sort_by_distance(
    spots: impl IntoIterator<Item = Spot>,
    from: Coordinate,
    direction: SortDirection,
) -> Vec<Spot> {
    let mut keyed: Vec<(f64, Spot)> = spots
        .into_iter()
        .map(|spot| (from.distance_to(&spot.coordinate), spot))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| direction.apply(a.total_cmp(b)));
    keyed.into_iter().map(|(_, spot)| spot).collect()
}

/// Keys for looking a spot up by any of its identifiers.
///
/// Keys are tried in priority order: local id, map-provider id, remote id.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SpotKeys {
    /// Local identifier.
    pub id: Option<Uuid>,
    /// Map-provider identifier.
    pub map_provider_id: Option<String>,
    /// Remote-service identifier.
    pub remote_id: Option<String>,
}

impl SpotKeys {
    /// Create an empty key set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up by local id.
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Look up by map-provider id.
    pub fn map_provider_id(mut self, id: impl Into<String>) -> Self {
        self.map_provider_id = Some(id.into());
        self
    }

    /// Look up by remote id.
    pub fn remote_id(mut self, id: impl Into<String>) -> Self {
        self.remote_id = Some(id.into());
        self
    }

    /// Whether every key is absent.
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.map_provider_id.is_none() && self.remote_id.is_none()
    }
}

impl From<&Spot> for SpotKeys {
    fn from(spot: &Spot) -> Self {
        Self {
            id: Some(spot.id),
            map_provider_id: spot.map_provider_id.clone(),
            remote_id: spot.remote_id.clone(),
        }
    }
}

/// Order of an experience listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperienceSort {
    /// By experience name.
    Name(SortDirection),
}

impl Default for ExperienceSort {
    fn default() -> Self {
        ExperienceSort::Name(SortDirection::Ascending)
    }
}

impl ExperienceSort {
    pub(crate) fn order_clause(&self) -> String {
        match self {
            ExperienceSort::Name(direction) => {
                format!("ORDER BY e.name COLLATE BINARY {}, e.pk ASC", direction.as_sql())
            }
        }
    }
}
