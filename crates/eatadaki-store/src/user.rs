//! Signed-in user storage.
//!
//! The `users` table holds at most one row. Saving replaces whatever is
//! there in a single transaction.

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use eatadaki_types::User;

use crate::database::{Database, delete_all};
use crate::error::UserError;
use crate::observe::Observation;

const OBSERVED_TABLES: &[&str] = &["users"];

/// Live stream of the signed-in user.
pub type UserObservation = Observation<Option<User>, UserError>;

/// Access to the signed-in user.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    /// Create a repository over the user store.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The stored user, if any.
    pub async fn fetch(&self) -> Result<Option<User>, UserError> {
        self.db.read(load_user).await
    }

    /// Replace the stored user.
    pub async fn save(&self, user: User) -> Result<User, UserError> {
        self.db
            .write(|conn| {
                let tx = conn.transaction()?;
                delete_all(&tx, "users")?;
                tx.execute(
                    "INSERT INTO users (id, email, created_at) VALUES (?1, ?2, ?3)",
                    rusqlite::params![user.id, user.email, user.created_at],
                )?;
                tx.commit()?;
                Ok::<_, UserError>(())
            })
            .await?;
        debug!(id = %user.id, "Saved user");
        Ok(user)
    }

    /// Remove the stored user.
    pub async fn clear(&self) -> Result<(), UserError> {
        self.db
            .write(|conn| delete_all(conn, "users"))
            .await?;
        debug!("Cleared user");
        Ok(())
    }

    /// Observe the stored user, starting with the current value.
    pub async fn observe(&self) -> UserObservation {
        Observation::start(self.db.clone(), OBSERVED_TABLES, load_user).await
    }
}

fn load_user(conn: &Connection) -> Result<Option<User>, UserError> {
    let user = conn
        .query_row(
            "SELECT id, email, created_at FROM users ORDER BY rowid DESC LIMIT 1",
            [],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    created_at: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}
