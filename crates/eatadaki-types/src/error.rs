//! Error types for validating Eatadaki domain values.

use thiserror::Error;

/// Errors raised when constructing or parsing domain values.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// Rating outside the inclusive `1..=10` half-star range.
    #[error("Rating must be between 1 and 10 half-stars, got {0}")]
    RatingOutOfRange(i64),

    /// A display name was empty or whitespace only.
    #[error("Name cannot be empty")]
    EmptyName,

    /// Latitude outside `[-90, 90]` or not finite.
    #[error("Latitude {0} is outside [-90, 90]")]
    InvalidLatitude(f64),

    /// Longitude outside `[-180, 180]` or not finite.
    #[error("Longitude {0} is outside [-180, 180]")]
    InvalidLongitude(f64),

    /// Stored creation reason did not match a known variant.
    #[error("Unknown creation reason: {0}")]
    UnknownCreationReason(String),

    /// Device configuration key did not match a known setting.
    #[error("Unknown device configuration key: {0}")]
    UnknownConfigKey(String),

    /// Coordinate string was not in `lat,lon` form.
    #[error("Invalid coordinate '{0}', expected 'latitude,longitude'")]
    MalformedCoordinate(String),
}

/// Result type alias using eatadaki-types' ValidationError type.
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;
