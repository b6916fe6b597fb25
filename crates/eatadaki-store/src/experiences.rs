//! Experience repository.

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use eatadaki_types::{Experience, ExperienceRating, NewRating, Rating, ValidationError};

use crate::database::Database;
use crate::error::ExperienceError;
use crate::models::{ExperienceDetails, ExperienceSummary};
use crate::observe::Observation;
use crate::queries::ExperienceSort;
use crate::spots::{SPOT_COLUMNS, read_spot};

/// Spot columns followed by experience columns, for joined queries.
const JOINED_COLUMNS: &str = "s.id, s.map_provider_id, s.remote_id, s.name, s.latitude, \
     s.longitude, s.created_at, s.reason, \
     e.id, e.spot_id, e.remote_id, e.name, e.description, e.created_at";

/// An experience listing depends on its spots as well.
const OBSERVED_TABLES: &[&str] = &["spots", "experiences", "experience_ratings"];

/// Live stream of experience listings.
pub type ExperienceObservation = Observation<Vec<ExperienceSummary>, ExperienceError>;

/// Access to experiences and their rating history.
#[derive(Debug, Clone)]
pub struct ExperienceRepository {
    db: Database,
}

impl ExperienceRepository {
    /// Create a repository over the experiences store.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Log a new experience at `spot_id`, optionally with a first rating.
    ///
    /// Everything happens in one transaction. The spot must exist and the
    /// rating, when given, must have been made for the same spot; otherwise
    /// nothing is stored.
    pub async fn create(
        &self,
        spot_id: Uuid,
        name: impl Into<String>,
        description: Option<String>,
        rating: Option<NewRating>,
    ) -> Result<ExperienceDetails, ExperienceError> {
        let experience = Experience::new(spot_id, name, description);
        if experience.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }

        let details = self
            .db
            .write(|conn| create_in(conn, experience, rating))
            .await?;
        debug!(
            id = %details.experience.id,
            spot = %spot_id,
            rated = !details.ratings.is_empty(),
            "Created experience"
        );
        Ok(details)
    }

    /// Fetch an experience with its spot and rating history.
    pub async fn fetch(&self, id: Uuid) -> Result<ExperienceDetails, ExperienceError> {
        self.db.read(|conn| load_details(conn, id)).await
    }

    /// Fetch every experience with its spot.
    pub async fn fetch_all(
        &self,
        sort: ExperienceSort,
    ) -> Result<Vec<ExperienceSummary>, ExperienceError> {
        self.db.read(|conn| load_summaries(conn, sort)).await
    }

    /// Observe the experience listing.
    ///
    /// Changes to spots count too, since each summary carries its spot.
    pub async fn observe(&self, sort: ExperienceSort) -> ExperienceObservation {
        Observation::start(self.db.clone(), OBSERVED_TABLES, move |conn: &Connection| {
            load_summaries(conn, sort)
        })
        .await
    }

    /// Append a rating to an experience's history.
    pub async fn rate(
        &self,
        experience_id: Uuid,
        rating: Rating,
        notes: Option<String>,
    ) -> Result<ExperienceRating, ExperienceError> {
        let entry = ExperienceRating::new(experience_id, rating, notes);
        self.db
            .write(|conn| {
                let tx = conn.transaction()?;
                if !experience_exists(&tx, experience_id)? {
                    return Err(ExperienceError::NotFound(experience_id));
                }
                insert_rating(&tx, &entry)?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        debug!(experience = %experience_id, rating = %entry.rating, "Rated experience");
        Ok(entry)
    }

    /// Delete an experience and its ratings.
    pub async fn delete(&self, id: Uuid) -> Result<(), ExperienceError> {
        let deleted = self
            .db
            .write(|conn| conn.execute("DELETE FROM experiences WHERE id = ?1", [id]))
            .await?;
        if deleted == 0 {
            return Err(ExperienceError::NotFound(id));
        }
        debug!(%id, "Deleted experience");
        Ok(())
    }
}

fn create_in(
    conn: &mut Connection,
    experience: Experience,
    rating: Option<NewRating>,
) -> Result<ExperienceDetails, ExperienceError> {
    let tx = conn.transaction()?;

    let spot = tx
        .query_row(
            &format!("SELECT {SPOT_COLUMNS} FROM spots WHERE id = ?1"),
            [experience.spot_id],
            |row| read_spot(row, 0),
        )
        .optional()?
        .ok_or(ExperienceError::SpotNotFound(experience.spot_id))?;

    if let Some(rating) = &rating {
        if rating.spot_id != spot.id {
            return Err(ExperienceError::InvalidRating {
                expected: spot.id,
                found: rating.spot_id,
            });
        }
    }

    tx.execute(
        "INSERT INTO experiences (id, spot_id, remote_id, name, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            experience.id,
            experience.spot_id,
            experience.remote_id,
            experience.name,
            experience.description,
            experience.created_at,
        ],
    )?;

    let ratings = match rating {
        Some(rating) => {
            let entry = ExperienceRating::new(experience.id, rating.rating, rating.notes);
            insert_rating(&tx, &entry)?;
            vec![entry]
        }
        None => Vec::new(),
    };

    tx.commit()?;
    Ok(ExperienceDetails {
        spot,
        experience,
        ratings,
    })
}

fn insert_rating(tx: &Transaction<'_>, entry: &ExperienceRating) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO experience_ratings (id, experience_id, rating, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            entry.id,
            entry.experience_id,
            i64::from(entry.rating),
            entry.notes,
            entry.created_at,
        ],
    )?;
    Ok(())
}

fn experience_exists(conn: &Connection, id: Uuid) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM experiences WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )
}

fn read_summary(row: &Row<'_>) -> rusqlite::Result<ExperienceSummary> {
    Ok(ExperienceSummary {
        spot: read_spot(row, 0)?,
        experience: Experience {
            id: row.get(8)?,
            spot_id: row.get(9)?,
            remote_id: row.get(10)?,
            name: row.get(11)?,
            description: row.get(12)?,
            created_at: row.get(13)?,
        },
    })
}

fn read_rating(row: &Row<'_>) -> rusqlite::Result<ExperienceRating> {
    let value: i64 = row.get(2)?;
    let rating = Rating::new(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Integer, Box::new(e)))?;

    Ok(ExperienceRating {
        id: row.get(0)?,
        experience_id: row.get(1)?,
        rating,
        notes: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn load_summaries(
    conn: &Connection,
    sort: ExperienceSort,
) -> Result<Vec<ExperienceSummary>, ExperienceError> {
    let sql = format!(
        "SELECT {JOINED_COLUMNS} FROM experiences e JOIN spots s ON s.id = e.spot_id {}",
        sort.order_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let summaries = stmt
        .query_map([], read_summary)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(summaries)
}

fn load_details(conn: &Connection, id: Uuid) -> Result<ExperienceDetails, ExperienceError> {
    let summary = conn
        .query_row(
            &format!(
                "SELECT {JOINED_COLUMNS} FROM experiences e JOIN spots s ON s.id = e.spot_id
                 WHERE e.id = ?1"
            ),
            [id],
            read_summary,
        )
        .optional()?
        .ok_or(ExperienceError::NotFound(id))?;

    let mut stmt = conn.prepare(
        "SELECT id, experience_id, rating, notes, created_at
         FROM experience_ratings WHERE experience_id = ?1 ORDER BY pk ASC",
    )?;
    let mut ratings = stmt
        .query_map([id], read_rating)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    // Stable, so equal timestamps keep insertion order.
    ratings.sort_by_key(|r| r.created_at);

    Ok(ExperienceDetails {
        spot: summary.spot,
        experience: summary.experience,
        ratings,
    })
}
