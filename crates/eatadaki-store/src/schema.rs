//! Database schemas and migrations.
//!
//! Every store has its own ordered list of migrations. The applied version
//! is kept in a single-row `schema_version` table; opening a store applies
//! whatever migrations are missing, each inside its own transaction.

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::{Error, Result, StorageError};

/// A store's schema: its name and the migrations that build it, oldest first.
#[derive(Debug)]
pub(crate) struct Schema {
    pub(crate) store: &'static str,
    migrations: &'static [&'static str],
}

impl Schema {
    /// Version reached once every migration has been applied.
    pub(crate) fn version(&self) -> u32 {
        u32::try_from(self.migrations.len()).unwrap_or(u32::MAX)
    }
}

/// Signed-in user (singleton by convention).
pub(crate) const USER: Schema = Schema {
    store: "user",
    migrations: &[USER_V1],
};

/// Per-device settings.
pub(crate) const DEVICE_CONFIG: Schema = Schema {
    store: "device_config",
    migrations: &[DEVICE_CONFIG_V1],
};

/// Spots, their R-tree index, experiences and rating history.
pub(crate) const EXPERIENCES: Schema = Schema {
    store: "experiences",
    migrations: &[EXPERIENCES_V1],
};

const USER_V1: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id BLOB PRIMARY KEY,
        email TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
"#;

const DEVICE_CONFIG_V1: &str = r#"
    CREATE TABLE IF NOT EXISTS device_configuration (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
"#;

const EXPERIENCES_V1: &str = r#"
    -- Spots are roots; pk doubles as the R-tree key
    CREATE TABLE IF NOT EXISTS spots (
        pk INTEGER PRIMARY KEY,
        id BLOB NOT NULL UNIQUE,
        map_provider_id TEXT UNIQUE,
        remote_id TEXT,
        name TEXT NOT NULL,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL,
        created_at TEXT NOT NULL,
        reason TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_spots_remote_id ON spots(remote_id);

    -- One degenerate box (min = max) per spot
    CREATE VIRTUAL TABLE IF NOT EXISTS spot_locations USING rtree(
        spot_pk,
        min_lon, max_lon,
        min_lat, max_lat
    );
    CREATE TRIGGER IF NOT EXISTS spots_delete_location
        AFTER DELETE ON spots
    BEGIN
        DELETE FROM spot_locations WHERE spot_pk = old.pk;
    END;

    CREATE TABLE IF NOT EXISTS experiences (
        pk INTEGER PRIMARY KEY,
        id BLOB NOT NULL UNIQUE,
        spot_id BLOB NOT NULL REFERENCES spots(id) ON DELETE CASCADE,
        remote_id TEXT,
        name TEXT NOT NULL,
        description TEXT,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_experiences_spot ON experiences(spot_id);

    CREATE TABLE IF NOT EXISTS experience_ratings (
        pk INTEGER PRIMARY KEY,
        id BLOB NOT NULL UNIQUE,
        experience_id BLOB NOT NULL REFERENCES experiences(id) ON DELETE CASCADE,
        rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 10),
        notes TEXT,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_ratings_experience
        ON experience_ratings(experience_id, created_at);
"#;

/// Initialize the database schema, applying any missing migrations.
pub(crate) fn initialize(conn: &mut Connection, schema: &Schema) -> Result<()> {
    let supported = schema.version();
    let version = get_schema_version(conn).map_err(|source| Error::Migration {
        store: schema.store,
        version: supported,
        source: source.into(),
    })?;

    if version > supported {
        return Err(Error::UnsupportedVersion {
            store: schema.store,
            found: version,
            supported,
        });
    }

    for (target, sql) in (1..=supported).zip(schema.migrations.iter()) {
        if target <= version {
            continue;
        }
        info!("Migrating {} database to version {}", schema.store, target);
        apply(conn, sql, target).map_err(|source| Error::Migration {
            store: schema.store,
            version: target,
            source,
        })?;
    }

    Ok(())
}

fn apply(conn: &mut Connection, sql: &str, target: u32) -> std::result::Result<(), StorageError> {
    let tx = conn.transaction()?;
    tx.execute_batch(sql)?;
    set_schema_version(&tx, target)?;
    tx.commit()?;
    Ok(())
}

/// Get the current schema version (0 for a fresh database).
fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: Option<u32> = conn
        .query_row("SELECT version FROM schema_version WHERE id = 1", [], |row| {
            row.get(0)
        })
        .optional()?;

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );",
    )?;
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?)",
        [version],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type IN ('table', 'trigger') ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_initialize_experiences_database() {
        let mut conn = Connection::open_in_memory().unwrap();
        initialize(&mut conn, &EXPERIENCES).unwrap();

        let tables = table_names(&conn);
        for expected in [
            "spots",
            "spot_locations",
            "spots_delete_location",
            "experiences",
            "experience_ratings",
            "schema_version",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn test_initialize_user_and_device_config() {
        let mut user = Connection::open_in_memory().unwrap();
        initialize(&mut user, &USER).unwrap();
        assert!(table_names(&user).contains(&"users".to_string()));

        let mut config = Connection::open_in_memory().unwrap();
        initialize(&mut config, &DEVICE_CONFIG).unwrap();
        let tables = table_names(&config);
        assert!(tables.contains(&"device_configuration".to_string()));
        assert!(!tables.contains(&"users".to_string()));
    }

    #[test]
    fn test_schema_version_tracking() {
        let mut conn = Connection::open_in_memory().unwrap();

        // Fresh database should have version 0
        assert_eq!(get_schema_version(&conn).unwrap(), 0);

        initialize(&mut conn, &USER).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), USER.version());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        initialize(&mut conn, &EXPERIENCES).unwrap();
        let before = table_names(&conn);

        initialize(&mut conn, &EXPERIENCES).unwrap();
        assert_eq!(table_names(&conn), before);
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        initialize(&mut conn, &USER).unwrap();
        set_schema_version(&conn, 99).unwrap();

        let err = initialize(&mut conn, &USER).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedVersion {
                found: 99,
                supported: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_failed_migration_reports_store() {
        const BROKEN: Schema = Schema {
            store: "broken",
            migrations: &["CREATE TABLE ok (id INTEGER);", "CREATE TABLE (;"],
        };
        let mut conn = Connection::open_in_memory().unwrap();

        let err = initialize(&mut conn, &BROKEN).unwrap_err();
        assert!(matches!(
            err,
            Error::Migration {
                store: "broken",
                version: 2,
                ..
            }
        ));
        // The first migration committed, the second rolled back.
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }
}
