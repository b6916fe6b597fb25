//! Local persistence for Eatadaki.
//!
//! This crate keeps everything Eatadaki knows on the device in three
//! independent SQLite databases:
//!
//! - `user.sqlite`: the signed-in user
//! - `device_config.sqlite`: per-device settings
//! - `experiences.sqlite`: spots, their R-tree location index, experiences
//!   and rating history
//!
//! # Features
//!
//! - Versioned migrations per store
//! - Spot upserts keyed by local, map-provider or remote id
//! - Name and distance ordering with a case-insensitive name filter
//! - Bounding-box lookups through the R-tree index
//! - Live query streams driven by SQLite change hooks
//! - Cascading deletes from spots to experiences to ratings
//!
//! # Example
//!
//! ```no_run
//! use eatadaki_store::{SpotQuery, Stores};
//! use eatadaki_types::{Coordinate, CreationReason, SortDirection, Spot};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let stores = Stores::open_default()?;
//!
//! stores
//!     .spots
//!     .save(Spot::new("Afuri", Coordinate::new(35.648, 139.708), CreationReason::Manual))
//!     .await?;
//!
//! let nearest = stores
//!     .spots
//!     .fetch_all(&SpotQuery::new().by_distance(Coordinate::new(35.66, 139.70), SortDirection::Ascending))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod database;
mod device_config;
mod error;
mod experiences;
mod models;
mod observe;
mod queries;
mod schema;
mod search;
mod spots;
mod stores;
mod user;

pub use database::{Database, StoreKind};
pub use device_config::DeviceConfigurationController;
pub use error::{
    ConstraintKind, DeviceConfigError, Error, ExperienceError, Result, SearchError, SpotError,
    StorageError, UserError,
};
pub use experiences::{ExperienceObservation, ExperienceRepository};
pub use models::{ExperienceDetails, ExperienceSummary};
pub use observe::Observation;
pub use queries::{ExperienceSort, SpotKeys, SpotQuery, SpotSort};
pub use search::{FinderError, FixedLocation, LocationProvider, NoLocation, SpotFinder, SpotSearch};
pub use spots::{SpotObservation, SpotRepository};
pub use stores::{Stores, default_data_dir};
pub use user::{UserObservation, UserRepository};
