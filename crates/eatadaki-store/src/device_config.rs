//! Per-device settings.

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, warn};

use eatadaki_types::DeviceConfigKey;

use crate::database::Database;
use crate::error::DeviceConfigError;

/// Reads and writes the device configuration store.
#[derive(Debug, Clone)]
pub struct DeviceConfigurationController {
    db: Database,
}

impl DeviceConfigurationController {
    /// Create a controller over the device configuration store.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Whether the user opted into location services. Defaults to `false`.
    pub async fn opted_into_location_services(&self) -> Result<bool, DeviceConfigError> {
        self.get_flag(DeviceConfigKey::LocationServicesOptIn).await
    }

    /// Record the location services opt-in.
    pub async fn set_opted_into_location_services(
        &self,
        opted_in: bool,
    ) -> Result<(), DeviceConfigError> {
        self.set_flag(DeviceConfigKey::LocationServicesOptIn, opted_in)
            .await
    }

    /// Raw stored value for `key`.
    pub async fn get(&self, key: DeviceConfigKey) -> Result<Option<String>, DeviceConfigError> {
        self.db.read(|conn| load_value(conn, key)).await
    }

    /// Every stored setting, in key order.
    pub async fn entries(&self) -> Result<Vec<(DeviceConfigKey, String)>, DeviceConfigError> {
        self.db
            .read(|conn| {
                let mut stmt =
                    conn.prepare("SELECT key, value FROM device_configuration ORDER BY key")?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok::<_, DeviceConfigError>(rows)
            })
            .await
            .map(|rows| {
                rows.into_iter()
                    .filter_map(|(key, value)| match key.parse::<DeviceConfigKey>() {
                        Ok(key) => Some((key, value)),
                        Err(_) => {
                            warn!(%key, "Ignoring unknown device configuration key");
                            None
                        }
                    })
                    .collect()
            })
    }

    /// Reset the configuration.
    ///
    /// Not supported: there is no agreed meaning for a reset yet, so this
    /// always fails and leaves the stored settings untouched.
    pub async fn reset(&self) -> Result<(), DeviceConfigError> {
        Err(DeviceConfigError::Unsupported("reset"))
    }

    async fn get_flag(&self, key: DeviceConfigKey) -> Result<bool, DeviceConfigError> {
        match self.get(key).await? {
            None => Ok(false),
            Some(value) => match value.as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(DeviceConfigError::InvalidValue { key, value }),
            },
        }
    }

    async fn set_flag(&self, key: DeviceConfigKey, value: bool) -> Result<(), DeviceConfigError> {
        let value = if value { "true" } else { "false" };
        self.db
            .write(|conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM device_configuration WHERE key = ?1",
                    [key.as_str()],
                )?;
                tx.execute(
                    "INSERT INTO device_configuration (key, value) VALUES (?1, ?2)",
                    [key.as_str(), value],
                )?;
                tx.commit()?;
                Ok::<_, DeviceConfigError>(())
            })
            .await?;
        debug!(%key, value, "Updated device configuration");
        Ok(())
    }
}

fn load_value(conn: &Connection, key: DeviceConfigKey) -> Result<Option<String>, DeviceConfigError> {
    let value = conn
        .query_row(
            "SELECT value FROM device_configuration WHERE key = ?1",
            [key.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::StoreKind;

    fn controller() -> DeviceConfigurationController {
        DeviceConfigurationController::new(Database::open_in_memory(StoreKind::DeviceConfig).unwrap())
    }

    #[tokio::test]
    async fn test_defaults_to_false() {
        let config = controller();
        assert!(!config.opted_into_location_services().await.unwrap());
        assert_eq!(
            config.get(DeviceConfigKey::LocationServicesOptIn).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_set_and_toggle() {
        let config = controller();
        config.set_opted_into_location_services(true).await.unwrap();
        assert!(config.opted_into_location_services().await.unwrap());

        config.set_opted_into_location_services(false).await.unwrap();
        assert!(!config.opted_into_location_services().await.unwrap());

        let entries = config.entries().await.unwrap();
        assert_eq!(
            entries,
            [(DeviceConfigKey::LocationServicesOptIn, "false".to_string())]
        );
    }

    #[tokio::test]
    async fn test_invalid_stored_value() {
        let config = controller();
        config
            .db
            .write(|conn| {
                conn.execute(
                    "INSERT INTO device_configuration (key, value)
                     VALUES ('opted_into_location_services', 'yes')",
                    [],
                )
            })
            .await
            .unwrap();

        let err = config.opted_into_location_services().await.unwrap_err();
        assert_eq!(
            err,
            DeviceConfigError::InvalidValue {
                key: DeviceConfigKey::LocationServicesOptIn,
                value: "yes".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_keys_are_skipped() {
        let config = controller();
        config
            .db
            .write(|conn| {
                conn.execute(
                    "INSERT INTO device_configuration (key, value) VALUES ('legacy', '1')",
                    [],
                )
            })
            .await
            .unwrap();
        assert!(config.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reset_is_unsupported_and_keeps_data() {
        let config = controller();
        config.set_opted_into_location_services(true).await.unwrap();

        assert_eq!(
            config.reset().await.unwrap_err(),
            DeviceConfigError::Unsupported("reset")
        );
        assert!(config.opted_into_location_services().await.unwrap());
    }
}
