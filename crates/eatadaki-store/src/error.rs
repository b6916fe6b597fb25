//! Error types for eatadaki-store.
//!
//! Two layers exist. [`StorageError`] classifies failures reported by SQLite
//! itself. Each repository then has its own error enum that keeps domain
//! rule violations (a missing spot, a rating for the wrong spot) apart from
//! storage failures, so callers can branch without inspecting messages.

use std::path::PathBuf;

use rusqlite::ErrorCode;
use uuid::Uuid;

use eatadaki_types::{DeviceConfigKey, ValidationError};

/// Result type for opening stores.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while opening a store.
///
/// All of these are fatal for the store being opened.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to open or configure the SQLite connection.
    #[error("Failed to open {store} database at {path}: {source}")]
    Open {
        store: &'static str,
        path: PathBuf,
        source: StorageError,
    },

    /// A schema migration failed.
    #[error("Failed to migrate {store} database to version {version}: {source}")]
    Migration {
        store: &'static str,
        version: u32,
        source: StorageError,
    },

    /// The database was written by a newer schema than this build knows.
    #[error("{store} database has schema version {found}; newest supported is {supported}")]
    UnsupportedVersion {
        store: &'static str,
        found: u32,
        supported: u32,
    },
}

/// Which constraint a write violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    PrimaryKey,
    ForeignKey,
    NotNull,
    Check,
    Other,
}

impl ConstraintKind {
    fn from_extended_code(code: std::os::raw::c_int) -> Self {
        match code {
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => ConstraintKind::Unique,
            rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => ConstraintKind::PrimaryKey,
            rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ConstraintKind::ForeignKey,
            rusqlite::ffi::SQLITE_CONSTRAINT_NOTNULL => ConstraintKind::NotNull,
            rusqlite::ffi::SQLITE_CONSTRAINT_CHECK => ConstraintKind::Check,
            _ => ConstraintKind::Other,
        }
    }
}

/// Storage failures reported by SQLite.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    /// A constraint rejected the write.
    #[error("Constraint violated: {message}")]
    Constraint {
        kind: ConstraintKind,
        message: String,
    },

    /// Another connection holds a conflicting lock.
    #[error("Database is busy or locked")]
    Busy,

    /// The file is damaged or is not a SQLite database.
    #[error("Database file is corrupt or not a database")]
    Corrupt,

    /// A stored value could not be decoded.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// Any other failure.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Whether this is a UNIQUE violation mentioning `column` (e.g. `spots.map_provider_id`).
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        matches!(
            self,
            StorageError::Constraint { kind: ConstraintKind::Unique | ConstraintKind::PrimaryKey, message }
                if message.contains(column)
        )
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, message) => {
                let message = message.unwrap_or_else(|| failure.to_string());
                match failure.code {
                    ErrorCode::ConstraintViolation => StorageError::Constraint {
                        kind: ConstraintKind::from_extended_code(failure.extended_code),
                        message,
                    },
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => StorageError::Busy,
                    ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase => StorageError::Corrupt,
                    _ => StorageError::Unavailable(message),
                }
            }
            err @ (rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)) => {
                StorageError::InvalidData(err.to_string())
            }
            other => StorageError::Unavailable(other.to_string()),
        }
    }
}

/// Errors from [`SpotRepository`](crate::SpotRepository).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpotError {
    /// No spot matched the requested key(s).
    #[error("Spot not found")]
    NotFound,

    /// A keyed lookup was made with every key absent.
    #[error("No spot identifiers were provided")]
    NoIdsProvided,

    /// Another spot already uses this map-provider identifier.
    #[error("A spot with map provider id '{0}' already exists")]
    DuplicateMapProviderId(String),

    /// Another spot already uses this local identifier.
    #[error("A spot with id {0} already exists")]
    DuplicateId(Uuid),

    /// The spot failed validation before reaching storage.
    #[error("Invalid spot: {0}")]
    Invalid(#[from] ValidationError),

    /// Unexpected storage failure.
    #[error("Database error: {0}")]
    Database(#[from] StorageError),
}

impl From<rusqlite::Error> for SpotError {
    fn from(err: rusqlite::Error) -> Self {
        SpotError::Database(err.into())
    }
}

/// Errors from [`ExperienceRepository`](crate::ExperienceRepository).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExperienceError {
    /// The spot the experience belongs to does not exist.
    #[error("Spot {0} not found")]
    SpotNotFound(Uuid),

    /// The experience does not exist.
    #[error("Experience {0} not found")]
    NotFound(Uuid),

    /// A rating was supplied for a different spot than the experience.
    #[error("Rating was made for spot {found}, expected spot {expected}")]
    InvalidRating { expected: Uuid, found: Uuid },

    /// The experience failed validation before reaching storage.
    #[error("Invalid experience: {0}")]
    Invalid(#[from] ValidationError),

    /// Unexpected storage failure.
    #[error("Database error: {0}")]
    Database(#[from] StorageError),
}

impl From<rusqlite::Error> for ExperienceError {
    fn from(err: rusqlite::Error) -> Self {
        ExperienceError::Database(err.into())
    }
}

/// Errors from [`UserRepository`](crate::UserRepository).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UserError {
    /// Unexpected storage failure.
    #[error("Database error: {0}")]
    Database(#[from] StorageError),
}

impl From<rusqlite::Error> for UserError {
    fn from(err: rusqlite::Error) -> Self {
        UserError::Database(err.into())
    }
}

/// Errors from [`DeviceConfigurationController`](crate::DeviceConfigurationController).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeviceConfigError {
    /// A stored value could not be interpreted for its key.
    #[error("Invalid value '{value}' stored for {key}")]
    InvalidValue { key: DeviceConfigKey, value: String },

    /// The operation has no defined behavior.
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),

    /// Unexpected storage failure.
    #[error("Database error: {0}")]
    Database(#[from] StorageError),
}

impl From<rusqlite::Error> for DeviceConfigError {
    fn from(err: rusqlite::Error) -> Self {
        DeviceConfigError::Database(err.into())
    }
}

/// Errors from [`SpotSearch`](crate::SpotSearch).
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The external finder failed.
    #[error("Spot search failed: {0}")]
    Finder(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Reading the location opt-in failed.
    #[error(transparent)]
    DeviceConfig(#[from] DeviceConfigError),

    /// Caching the results failed.
    #[error(transparent)]
    Spots(#[from] SpotError),
}
