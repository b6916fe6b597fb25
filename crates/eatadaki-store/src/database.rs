//! Connection handling and change notification.
//!
//! Each store owns one SQLite connection behind an async mutex, so writes
//! are serialized and reads never see a half-finished write. SQLite's update
//! hook records which tables a write touched; once the write has finished
//! (committed or rolled back) the touched tables are published on a broadcast
//! channel that observation streams listen to.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError};

use rusqlite::Connection;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info};

use crate::error::{Error, Result, StorageError};
use crate::schema::{self, Schema};

/// Capacity of the change broadcast channel.
///
/// A subscriber that falls further behind gets a `Lagged` error and simply
/// re-queries, so this only bounds memory.
const CHANGE_BUFFER: usize = 64;

/// The three independently owned stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    /// The signed-in user.
    User,
    /// Per-device settings.
    DeviceConfig,
    /// Spots, experiences and ratings.
    Experiences,
}

impl StoreKind {
    /// File name of this store inside the data directory.
    pub const fn file_name(&self) -> &'static str {
        match self {
            StoreKind::User => "user.sqlite",
            StoreKind::DeviceConfig => "device_config.sqlite",
            StoreKind::Experiences => "experiences.sqlite",
        }
    }

    fn schema(&self) -> &'static Schema {
        match self {
            StoreKind::User => &schema::USER,
            StoreKind::DeviceConfig => &schema::DEVICE_CONFIG,
            StoreKind::Experiences => &schema::EXPERIENCES,
        }
    }
}

/// Set of table names touched by one finished write.
#[derive(Debug, Clone)]
pub(crate) struct TableChanges(Arc<BTreeSet<String>>);

impl TableChanges {
    /// Whether any of `tables` was touched.
    pub(crate) fn touches(&self, tables: &[&str]) -> bool {
        tables.iter().any(|table| self.0.contains(*table))
    }
}

type PendingTables = Arc<std::sync::Mutex<BTreeSet<String>>>;

struct Inner {
    kind: StoreKind,
    conn: Mutex<Connection>,
    pending: PendingTables,
    changes: broadcast::Sender<TableChanges>,
}

/// Handle to one store's SQLite database.
///
/// Cloning is cheap; clones share the connection and change channel.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("kind", &self.inner.kind)
            .field("subscribers", &self.inner.changes.receiver_count())
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Open or create the database for `kind` at `path` and migrate it.
    pub fn open<P: AsRef<Path>>(kind: StoreKind, path: P) -> Result<Self> {
        let path = path.as_ref();
        let store = kind.schema().store;

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        info!("Opening {} database at {}", store, path.display());
        let open_error = |source: rusqlite::Error| Error::Open {
            store,
            path: path.to_path_buf(),
            source: StorageError::from(source),
        };
        let mut conn = Connection::open(path).map_err(open_error)?;

        // Enable foreign keys and WAL mode; the journal pragma returns a row
        conn.pragma_update(None, "foreign_keys", true)
            .map_err(open_error)?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
            .map_err(open_error)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(open_error)?;

        schema::initialize(&mut conn, kind.schema())?;

        Ok(Self::from_connection(kind, conn))
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory(kind: StoreKind) -> Result<Self> {
        let store = kind.schema().store;
        let open_error = |source: rusqlite::Error| Error::Open {
            store,
            path: ":memory:".into(),
            source: StorageError::from(source),
        };
        let mut conn = Connection::open_in_memory().map_err(open_error)?;
        conn.pragma_update(None, "foreign_keys", true)
            .map_err(open_error)?;
        schema::initialize(&mut conn, kind.schema())?;
        Ok(Self::from_connection(kind, conn))
    }

    fn from_connection(kind: StoreKind, conn: Connection) -> Self {
        let pending: PendingTables = Arc::default();

        let on_update = Arc::clone(&pending);
        conn.update_hook(Some(
            move |_action, _db: &str, table: &str, _rowid: i64| {
                on_update
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(table.to_string());
            },
        ));

        let on_rollback = Arc::clone(&pending);
        conn.rollback_hook(Some(move || {
            on_rollback
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }));

        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            inner: Arc::new(Inner {
                kind,
                conn: Mutex::new(conn),
                pending,
                changes,
            }),
        }
    }

    /// Which store this is.
    pub fn kind(&self) -> StoreKind {
        self.inner.kind
    }

    /// Run a read-only closure against the connection.
    pub(crate) async fn read<T, E>(
        &self,
        f: impl FnOnce(&Connection) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        let conn = self.inner.conn.lock().await;
        f(&*conn)
    }

    /// Run a writing closure and publish the tables it changed.
    ///
    /// The closure is expected to either commit or roll back everything it
    /// starts before returning.
    pub(crate) async fn write<T, E>(
        &self,
        f: impl FnOnce(&mut Connection) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        let mut conn = self.inner.conn.lock().await;
        let result = f(&mut *conn);
        self.publish();
        result
    }

    /// Subscribe to change notifications.
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<TableChanges> {
        self.inner.changes.subscribe()
    }

    fn publish(&self) {
        let tables = std::mem::take(
            &mut *self
                .inner
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if tables.is_empty() {
            return;
        }

        debug!(store = ?self.inner.kind, ?tables, "Publishing table changes");
        // No subscribers is fine.
        let _ = self.inner.changes.send(TableChanges(Arc::new(tables)));
    }
}

/// Delete every row of `table`.
///
/// An unfiltered `DELETE` lets SQLite truncate the table without calling the
/// update hook, which would hide the change from observers. The constant
/// `WHERE` clause forces a row-by-row delete.
pub(crate) fn delete_all(conn: &Connection, table: &str) -> rusqlite::Result<usize> {
    conn.execute(&format!("DELETE FROM {table} WHERE true"), [])
}
