//! Core types for Eatadaki spots, experiences and ratings.

use core::fmt;
use core::str::FromStr;

use geo::{Distance, Haversine, Point};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{ValidationError, ValidationResult};

/// Current UTC time truncated to whole milliseconds.
///
/// Records built with this timestamp compare equal after a round trip
/// through the store.
#[must_use]
pub fn timestamp_now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_millisecond(now.millisecond()).unwrap_or(now)
}

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Coordinate {
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate without range checks.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Create a coordinate, rejecting values outside the WGS84 ranges.
    ///
    /// # Examples
    ///
    /// ```
    /// use eatadaki_types::Coordinate;
    ///
    /// assert!(Coordinate::validated(35.68, 139.76).is_ok());
    /// assert!(Coordinate::validated(91.0, 0.0).is_err());
    /// assert!(Coordinate::validated(0.0, -180.5).is_err());
    /// ```
    pub fn validated(latitude: f64, longitude: f64) -> ValidationResult<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ValidationError::InvalidLatitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ValidationError::InvalidLongitude(longitude));
        }
        Ok(Self::new(latitude, longitude))
    }

    /// Great-circle distance to `other` in meters (haversine, mean earth radius).
    ///
    /// # Examples
    ///
    /// ```
    /// use eatadaki_types::Coordinate;
    ///
    /// let tokyo = Coordinate::new(35.6812, 139.7671);
    /// let osaka = Coordinate::new(34.7025, 135.4959);
    /// let km = tokyo.distance_to(&osaka) / 1000.0;
    /// assert!((390.0..410.0).contains(&km));
    /// ```
    #[must_use]
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        Haversine.distance(Point::from(*self), Point::from(*other))
    }
}

impl From<Coordinate> for Point<f64> {
    fn from(value: Coordinate) -> Self {
        Point::new(value.longitude, value.latitude)
    }
}

impl From<Coordinate> for geo::Coord<f64> {
    fn from(value: Coordinate) -> Self {
        geo::Coord {
            x: value.longitude,
            y: value.latitude,
        }
    }
}

impl FromStr for Coordinate {
    type Err = ValidationError;

    /// Parse `"latitude,longitude"`.
    ///
    /// ```
    /// use eatadaki_types::Coordinate;
    ///
    /// let c: Coordinate = "35.5, 139.25".parse().unwrap();
    /// assert_eq!(c, Coordinate::new(35.5, 139.25));
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ValidationError::MalformedCoordinate(s.to_string());
        let (lat, lon) = s.split_once(',').ok_or_else(malformed)?;
        let latitude = lat.trim().parse::<f64>().map_err(|_| malformed())?;
        let longitude = lon.trim().parse::<f64>().map_err(|_| malformed())?;
        Self::validated(latitude, longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5},{:.5}", self.latitude, self.longitude)
    }
}

/// Why a spot was first stored.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new sources
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum CreationReason {
    /// Cached from a map-provider search.
    #[default]
    SearchResult,
    /// Added by hand.
    Manual,
}

impl CreationReason {
    /// Stable string form used in storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            CreationReason::SearchResult => "search_result",
            CreationReason::Manual => "manual",
        }
    }
}

impl FromStr for CreationReason {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "search_result" => Ok(CreationReason::SearchResult),
            "manual" => Ok(CreationReason::Manual),
            other => Err(ValidationError::UnknownCreationReason(other.to_string())),
        }
    }
}

impl fmt::Display for CreationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreationReason::SearchResult => write!(f, "Search result"),
            CreationReason::Manual => write!(f, "Manual"),
        }
    }
}

/// A point of interest worth eating at.
///
/// `id`, `map_provider_id` and `created_at` are fixed once the spot is
/// stored; saving a spot again only refreshes its name, coordinate and
/// remote id.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Spot {
    /// Stable local identifier.
    pub id: Uuid,
    /// Identifier assigned by the map provider, unique when present.
    pub map_provider_id: Option<String>,
    /// Identifier assigned by a remote sync service.
    pub remote_id: Option<String>,
    /// Display name.
    pub name: String,
    /// Location of the spot.
    pub coordinate: Coordinate,
    /// When the spot was first stored.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub created_at: OffsetDateTime,
    /// How the spot was first stored.
    pub reason: CreationReason,
}

impl Spot {
    /// Create a new spot with a fresh id and the current timestamp.
    ///
    /// # Examples
    ///
    /// ```
    /// use eatadaki_types::{Coordinate, CreationReason, Spot};
    ///
    /// let spot = Spot::new("Ichiran", Coordinate::new(35.66, 139.70), CreationReason::Manual)
    ///     .with_map_provider_id("mp-123");
    /// assert_eq!(spot.map_provider_id.as_deref(), Some("mp-123"));
    /// assert!(spot.remote_id.is_none());
    /// ```
    #[must_use]
    pub fn new(name: impl Into<String>, coordinate: Coordinate, reason: CreationReason) -> Self {
        Self {
            id: Uuid::new_v4(),
            map_provider_id: None,
            remote_id: None,
            name: name.into(),
            coordinate,
            created_at: timestamp_now(),
            reason,
        }
    }

    /// Set the map-provider identifier.
    #[must_use]
    pub fn with_map_provider_id(mut self, id: impl Into<String>) -> Self {
        self.map_provider_id = Some(id.into());
        self
    }

    /// Set the remote-service identifier.
    #[must_use]
    pub fn with_remote_id(mut self, id: impl Into<String>) -> Self {
        self.remote_id = Some(id.into());
        self
    }

    /// Check that the spot has a usable name and coordinate.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Coordinate::validated(self.coordinate.latitude, self.coordinate.longitude)?;
        Ok(())
    }
}

/// A spot as returned by an external map search.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FoundSpot {
    /// Display name reported by the provider.
    pub name: String,
    /// Location reported by the provider.
    pub coordinate: Coordinate,
    /// Provider's identifier for the place.
    pub map_provider_id: String,
}

impl FoundSpot {
    /// Turn a search hit into a new spot tagged as a search result.
    #[must_use]
    pub fn into_spot(self) -> Spot {
        Spot::new(self.name, self.coordinate, CreationReason::SearchResult)
            .with_map_provider_id(self.map_provider_id)
    }
}

/// A rating in half-star units, from 1 (half a star) to 10 (five stars).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "i64", into = "i64"))]
pub struct Rating(u8);

impl Rating {
    /// Lowest allowed value (half a star).
    pub const MIN: u8 = 1;
    /// Highest allowed value (five stars).
    pub const MAX: u8 = 10;

    /// Validate and construct a rating.
    ///
    /// # Examples
    ///
    /// ```
    /// use eatadaki_types::Rating;
    ///
    /// let rating = Rating::new(7).unwrap();
    /// assert_eq!(rating.half_stars(), 7);
    /// assert_eq!(rating.stars(), 3.5);
    /// assert!(Rating::new(0).is_err());
    /// assert!(Rating::new(11).is_err());
    /// ```
    pub fn new(half_stars: i64) -> ValidationResult<Self> {
        match u8::try_from(half_stars) {
            Ok(value) if (Self::MIN..=Self::MAX).contains(&value) => Ok(Self(value)),
            _ => Err(ValidationError::RatingOutOfRange(half_stars)),
        }
    }

    /// Raw value in half-star units.
    #[must_use]
    pub const fn half_stars(&self) -> u8 {
        self.0
    }

    /// Value in stars (0.5 to 5.0).
    #[must_use]
    pub fn stars(&self) -> f32 {
        f32::from(self.0) / 2.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for i64 {
    fn from(value: Rating) -> Self {
        i64::from(value.0)
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}/5", self.stars())
    }
}

/// Rating supplied alongside a new experience.
///
/// `spot_id` names the spot the rating was made for; it must match the spot
/// the experience is created under.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NewRating {
    /// Spot the rating refers to.
    pub spot_id: Uuid,
    /// Rating value.
    pub rating: Rating,
    /// Optional free-text note.
    pub notes: Option<String>,
}

/// A visit or dish logged at a spot.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Experience {
    /// Local identifier.
    pub id: Uuid,
    /// Owning spot.
    pub spot_id: Uuid,
    /// Identifier assigned by a remote sync service.
    pub remote_id: Option<String>,
    /// Short title.
    pub name: String,
    /// Longer free-text description.
    pub description: Option<String>,
    /// When the experience was logged.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub created_at: OffsetDateTime,
}

impl Experience {
    /// Create a new experience for `spot_id` with a fresh id.
    #[must_use]
    pub fn new(spot_id: Uuid, name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            spot_id,
            remote_id: None,
            name: name.into(),
            description,
            created_at: timestamp_now(),
        }
    }
}

/// One entry in an experience's rating history.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExperienceRating {
    /// Local identifier.
    pub id: Uuid,
    /// Owning experience.
    pub experience_id: Uuid,
    /// Rating value.
    pub rating: Rating,
    /// Optional free-text note.
    pub notes: Option<String>,
    /// When the rating was recorded.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub created_at: OffsetDateTime,
}

impl ExperienceRating {
    /// Create a new rating entry for `experience_id`.
    #[must_use]
    pub fn new(experience_id: Uuid, rating: Rating, notes: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            experience_id,
            rating,
            notes,
            created_at: timestamp_now(),
        }
    }
}

/// The locally signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct User {
    /// Account identifier.
    pub id: Uuid,
    /// Account email address.
    pub email: String,
    /// When the account record was created locally.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub created_at: OffsetDateTime,
}

impl User {
    /// Create a user with a fresh id.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            created_at: timestamp_now(),
        }
    }
}

/// Named per-device settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[non_exhaustive]
pub enum DeviceConfigKey {
    /// Whether the user allowed location-based features.
    LocationServicesOptIn,
}

impl DeviceConfigKey {
    /// Every known key.
    pub const ALL: [DeviceConfigKey; 1] = [DeviceConfigKey::LocationServicesOptIn];

    /// Stable key used in storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DeviceConfigKey::LocationServicesOptIn => "opted_into_location_services",
        }
    }
}

impl FromStr for DeviceConfigKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownConfigKey(s.to_string()))
    }
}

impl fmt::Display for DeviceConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of an ordered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl SortDirection {
    /// Apply the direction to an ascending comparison result.
    #[must_use]
    pub fn apply(self, ordering: core::cmp::Ordering) -> core::cmp::Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }

    /// SQL keyword for this direction.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}
