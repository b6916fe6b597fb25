//! Opening all stores at once.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::database::{Database, StoreKind};
use crate::device_config::DeviceConfigurationController;
use crate::error::{Error, Result};
use crate::experiences::ExperienceRepository;
use crate::spots::SpotRepository;
use crate::user::UserRepository;

/// Default data directory following platform conventions.
///
/// - Linux: `~/.local/share/eatadaki`
/// - macOS: `~/Library/Application Support/eatadaki`
/// - Windows: `C:\Users\<user>\AppData\Local\eatadaki`
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eatadaki")
}

/// The three stores and the repositories built on them.
#[derive(Debug, Clone)]
pub struct Stores {
    pub user: UserRepository,
    pub device_config: DeviceConfigurationController,
    pub spots: SpotRepository,
    pub experiences: ExperienceRepository,
}

impl Stores {
    /// Open (creating and migrating as needed) every store under `dir`.
    ///
    /// A store that fails to open aborts the whole call.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| Error::CreateDirectory {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let open = |kind: StoreKind| Database::open(kind, dir.join(kind.file_name()));
        let stores = Self::from_databases(
            open(StoreKind::User)?,
            open(StoreKind::DeviceConfig)?,
            open(StoreKind::Experiences)?,
        );
        info!("Opened stores in {}", dir.display());
        Ok(stores)
    }

    /// Open the stores in [`default_data_dir`].
    pub fn open_default() -> Result<Self> {
        Self::open(default_data_dir())
    }

    /// Open every store in memory (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_databases(
            Database::open_in_memory(StoreKind::User)?,
            Database::open_in_memory(StoreKind::DeviceConfig)?,
            Database::open_in_memory(StoreKind::Experiences)?,
        ))
    }

    fn from_databases(user: Database, device_config: Database, experiences: Database) -> Self {
        Self {
            user: UserRepository::new(user),
            device_config: DeviceConfigurationController::new(device_config),
            spots: SpotRepository::new(experiences.clone()),
            experiences: ExperienceRepository::new(experiences),
        }
    }
}
