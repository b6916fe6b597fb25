//! Domain types for Eatadaki.
//!
//! This crate holds the plain data shared by the store, the CLI and any
//! future front end: spots, experiences, the rating history and the small
//! amount of per-user and per-device state.
//!
//! # Example
//!
//! ```
//! use eatadaki_types::{Coordinate, CreationReason, Rating, Spot};
//!
//! let spot = Spot::new("Afuri", Coordinate::new(35.648, 139.708), CreationReason::Manual);
//! assert!(spot.validate().is_ok());
//!
//! let rating = Rating::new(9)?;
//! assert_eq!(rating.stars(), 4.5);
//! # Ok::<(), eatadaki_types::ValidationError>(())
//! ```

pub mod error;
pub mod types;

pub use error::{ValidationError, ValidationResult};
pub use types::{
    Coordinate, CreationReason, DeviceConfigKey, Experience, ExperienceRating, FoundSpot,
    NewRating, Rating, SortDirection, Spot, User, timestamp_now,
};
