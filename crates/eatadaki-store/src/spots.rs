//! Spot repository.
//!
//! Spots live in the experiences store together with their R-tree entries.
//! Every write that stores a spot also refreshes its entry in
//! `spot_locations` inside the same transaction, and a trigger removes the
//! entry when the spot row is deleted.

use geo::Rect;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, ToSql, Transaction};
use tracing::debug;
use uuid::Uuid;

use eatadaki_types::{Coordinate, CreationReason, FoundSpot, Spot};

use crate::database::Database;
use crate::error::{SpotError, StorageError};
use crate::observe::Observation;
use crate::queries::{SpotKeys, SpotQuery};

/// Columns read by [`read_spot`], in order.
pub(crate) const SPOT_COLUMNS: &str =
    "id, map_provider_id, remote_id, name, latitude, longitude, created_at, reason";

/// Tables a spot listing depends on.
const OBSERVED_TABLES: &[&str] = &["spots"];

/// Live stream of spot listings.
pub type SpotObservation = Observation<Vec<Spot>, SpotError>;

/// Access to stored spots.
#[derive(Debug, Clone)]
pub struct SpotRepository {
    db: Database,
}

impl SpotRepository {
    /// Create a repository over the experiences store.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Fetch a spot by local id.
    pub async fn fetch(&self, id: Uuid) -> Result<Spot, SpotError> {
        self.fetch_any_of(&SpotKeys::new().id(id)).await
    }

    /// Fetch the first spot matching `keys`, trying id, then map-provider
    /// id, then remote id.
    pub async fn fetch_any_of(&self, keys: &SpotKeys) -> Result<Spot, SpotError> {
        if keys.is_empty() {
            return Err(SpotError::NoIdsProvided);
        }
        self.db
            .read(|conn| find_stored(conn, keys))
            .await?
            .map(|(_, spot)| spot)
            .ok_or(SpotError::NotFound)
    }

    /// Fetch every spot that passes `query`'s filter, in its order.
    pub async fn fetch_all(&self, query: &SpotQuery) -> Result<Vec<Spot>, SpotError> {
        self.db.read(|conn| load_spots(conn, query)).await
    }

    /// Observe the result of `query`.
    ///
    /// The first item is the current listing; another follows every write
    /// to the spots table.
    pub async fn observe(&self, query: SpotQuery) -> SpotObservation {
        Observation::start(self.db.clone(), OBSERVED_TABLES, move |conn: &Connection| {
            load_spots(conn, &query)
        })
        .await
    }

    /// Insert a new spot.
    ///
    /// Fails with [`SpotError::DuplicateMapProviderId`] when another spot
    /// already has the same map-provider id.
    pub async fn create(&self, spot: Spot) -> Result<Spot, SpotError> {
        spot.validate()?;
        self.db.write(|conn| create_in(conn, &spot)).await?;
        debug!(id = %spot.id, name = %spot.name, "Created spot");
        Ok(spot)
    }

    /// Insert or update a spot and return what was stored.
    ///
    /// An existing spot is matched by id, then map-provider id, then remote
    /// id. When one is found its name, coordinate and remote id are replaced
    /// and everything else is kept.
    pub async fn save(&self, spot: Spot) -> Result<Spot, SpotError> {
        spot.validate()?;
        self.db
            .write(|conn| {
                let tx = conn.transaction()?;
                let stored = upsert(&tx, spot)?;
                tx.commit()?;
                Ok::<_, SpotError>(stored)
            })
            .await
    }

    /// Delete a spot along with its experiences and ratings.
    pub async fn delete(&self, id: Uuid) -> Result<(), SpotError> {
        let deleted = self
            .db
            .write(|conn| conn.execute("DELETE FROM spots WHERE id = ?1", [id]))
            .await?;
        if deleted == 0 {
            return Err(SpotError::NotFound);
        }
        debug!(%id, "Deleted spot");
        Ok(())
    }

    /// Ids of spots whose location lies inside `bounds` (x is longitude,
    /// y is latitude), boundary included, in insertion order.
    ///
    /// This is a plain bounding-box test. Callers wanting a radius must
    /// refine the candidates themselves.
    pub async fn fetch_ids_in(&self, bounds: &Rect<f64>) -> Result<Vec<Uuid>, SpotError> {
        let (min, max) = (bounds.min(), bounds.max());
        self.db
            .read(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT s.id FROM spot_locations l
                     JOIN spots s ON s.pk = l.spot_pk
                     WHERE l.max_lon >= ?1 AND l.min_lon <= ?2
                       AND l.max_lat >= ?3 AND l.min_lat <= ?4
                       AND s.longitude BETWEEN ?1 AND ?2
                       AND s.latitude BETWEEN ?3 AND ?4
                     ORDER BY s.pk ASC",
                )?;
                let ids = stmt
                    .query_map(rusqlite::params![min.x, max.x, min.y, max.y], |row| {
                        row.get(0)
                    })?
                    .collect::<rusqlite::Result<Vec<Uuid>>>()?;
                Ok::<_, SpotError>(ids)
            })
            .await
    }

    /// Store map search results, merging with spots already known by their
    /// map-provider id. Returns the stored spots in input order.
    pub async fn cache_search_results(&self, found: &[FoundSpot]) -> Result<Vec<Spot>, SpotError> {
        let spots = found
            .iter()
            .cloned()
            .map(FoundSpot::into_spot)
            .map(|spot| spot.validate().map(|()| spot))
            .collect::<Result<Vec<_>, _>>()?;

        let stored = self
            .db
            .write(|conn| {
                let tx = conn.transaction()?;
                let stored = spots
                    .into_iter()
                    .map(|spot| upsert(&tx, spot))
                    .collect::<Result<Vec<_>, _>>()?;
                tx.commit()?;
                Ok::<_, SpotError>(stored)
            })
            .await?;

        debug!(count = stored.len(), "Cached search results");
        Ok(stored)
    }
}

/// Read a spot whose [`SPOT_COLUMNS`] start at column `offset`.
pub(crate) fn read_spot(row: &Row<'_>, offset: usize) -> rusqlite::Result<Spot> {
    let reason: String = row.get(offset + 7)?;
    let reason = reason.parse::<CreationReason>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(offset + 7, Type::Text, Box::new(e))
    })?;

    Ok(Spot {
        id: row.get(offset)?,
        map_provider_id: row.get(offset + 1)?,
        remote_id: row.get(offset + 2)?,
        name: row.get(offset + 3)?,
        coordinate: Coordinate::new(row.get(offset + 4)?, row.get(offset + 5)?),
        created_at: row.get(offset + 6)?,
        reason,
    })
}

fn load_spots(conn: &Connection, query: &SpotQuery) -> Result<Vec<Spot>, SpotError> {
    let sql = format!("SELECT {SPOT_COLUMNS} FROM spots {}", query.order_clause());
    let mut stmt = conn.prepare(&sql)?;
    let spots = stmt
        .query_map([], |row| read_spot(row, 0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(query.apply(spots))
}

fn select_one<P: ToSql>(
    conn: &Connection,
    predicate: &str,
    value: P,
) -> rusqlite::Result<Option<(i64, Spot)>> {
    let sql =
        format!("SELECT pk, {SPOT_COLUMNS} FROM spots WHERE {predicate} ORDER BY pk ASC LIMIT 1");
    conn.query_row(&sql, [value], |row| Ok((row.get(0)?, read_spot(row, 1)?)))
        .optional()
}

/// First stored spot matching `keys` in priority order, with its row key.
fn find_stored(conn: &Connection, keys: &SpotKeys) -> Result<Option<(i64, Spot)>, SpotError> {
    if let Some(id) = keys.id {
        if let Some(found) = select_one(conn, "id = ?1", id)? {
            return Ok(Some(found));
        }
    }
    if let Some(map_provider_id) = &keys.map_provider_id {
        if let Some(found) = select_one(conn, "map_provider_id = ?1", map_provider_id)? {
            return Ok(Some(found));
        }
    }
    if let Some(remote_id) = &keys.remote_id {
        if let Some(found) = select_one(conn, "remote_id = ?1", remote_id)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

fn create_in(conn: &mut Connection, spot: &Spot) -> Result<(), SpotError> {
    let tx = conn.transaction()?;
    let pk = insert_spot(&tx, spot).map_err(|e| insert_error(e, spot))?;
    index_location(&tx, pk, spot.coordinate)?;
    tx.commit()?;
    Ok(())
}

fn insert_error(err: rusqlite::Error, spot: &Spot) -> SpotError {
    let err = StorageError::from(err);
    if err.is_unique_violation_on("spots.map_provider_id") {
        if let Some(map_provider_id) = &spot.map_provider_id {
            return SpotError::DuplicateMapProviderId(map_provider_id.clone());
        }
    }
    if err.is_unique_violation_on("spots.id") {
        return SpotError::DuplicateId(spot.id);
    }
    SpotError::Database(err)
}

fn insert_spot(tx: &Transaction<'_>, spot: &Spot) -> rusqlite::Result<i64> {
    tx.execute(
        "INSERT INTO spots (id, map_provider_id, remote_id, name, latitude, longitude,
         created_at, reason) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            spot.id,
            spot.map_provider_id,
            spot.remote_id,
            spot.name,
            spot.coordinate.latitude,
            spot.coordinate.longitude,
            spot.created_at,
            spot.reason.as_str(),
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Save `spot` inside an open transaction.
fn upsert(tx: &Transaction<'_>, spot: Spot) -> Result<Spot, SpotError> {
    match find_stored(tx, &SpotKeys::from(&spot))? {
        Some((pk, existing)) => {
            let stored = Spot {
                name: spot.name,
                coordinate: spot.coordinate,
                remote_id: spot.remote_id,
                ..existing
            };
            tx.execute(
                "UPDATE spots SET name = ?2, latitude = ?3, longitude = ?4, remote_id = ?5
                 WHERE pk = ?1",
                rusqlite::params![
                    pk,
                    stored.name,
                    stored.coordinate.latitude,
                    stored.coordinate.longitude,
                    stored.remote_id,
                ],
            )?;
            index_location(tx, pk, stored.coordinate)?;
            debug!(id = %stored.id, "Updated spot");
            Ok(stored)
        }
        None => {
            let pk = insert_spot(tx, &spot).map_err(|e| insert_error(e, &spot))?;
            index_location(tx, pk, spot.coordinate)?;
            debug!(id = %spot.id, "Inserted spot");
            Ok(spot)
        }
    }
}

fn index_location(tx: &Transaction<'_>, pk: i64, coordinate: Coordinate) -> rusqlite::Result<()> {
    tx.execute("DELETE FROM spot_locations WHERE spot_pk = ?1", [pk])?;
    tx.execute(
        "INSERT INTO spot_locations (spot_pk, min_lon, max_lon, min_lat, max_lat)
         VALUES (?1, ?2, ?2, ?3, ?3)",
        rusqlite::params![pk, coordinate.longitude, coordinate.latitude],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::StoreKind;
    use eatadaki_types::SortDirection;

    fn repo() -> SpotRepository {
        SpotRepository::new(Database::open_in_memory(StoreKind::Experiences).unwrap())
    }

    fn spot(name: &str, lat: f64, lon: f64) -> Spot {
        Spot::new(name, Coordinate::new(lat, lon), CreationReason::Manual)
    }

    fn names(spots: &[Spot]) -> Vec<&str> {
        spots.iter().map(|s| s.name.as_str()).collect()
    }

    async fn count(repo: &SpotRepository) -> usize {
        repo.fetch_all(&SpotQuery::new()).await.unwrap().len()
    }

    #[tokio::test]
    async fn test_create_and_fetch() {
        let repo = repo();
        let created = repo
            .create(spot("Afuri", 35.648, 139.708).with_map_provider_id("mp-1"))
            .await
            .unwrap();

        let fetched = repo.fetch(created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_map_provider_id() {
        let repo = repo();
        repo.create(spot("A", 0.0, 0.0).with_map_provider_id("mp"))
            .await
            .unwrap();

        let err = repo
            .create(spot("B", 1.0, 1.0).with_map_provider_id("mp"))
            .await
            .unwrap_err();
        assert_eq!(err, SpotError::DuplicateMapProviderId("mp".into()));
        assert_eq!(count(&repo).await, 1);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_id() {
        let repo = repo();
        let first = repo.create(spot("A", 0.0, 0.0)).await.unwrap();

        let mut clash = spot("B", 1.0, 1.0);
        clash.id = first.id;
        let err = repo.create(clash).await.unwrap_err();
        assert_eq!(err, SpotError::DuplicateId(first.id));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_spot() {
        let repo = repo();
        let err = repo.create(spot("  ", 0.0, 0.0)).await.unwrap_err();
        assert!(matches!(err, SpotError::Invalid(_)));

        let err = repo.create(spot("Far", 95.0, 0.0)).await.unwrap_err();
        assert!(matches!(err, SpotError::Invalid(_)));
        assert_eq!(count(&repo).await, 0);
    }

    #[tokio::test]
    async fn test_save_of_created_spot_is_idempotent() {
        let repo = repo();
        let created = repo
            .create(spot("Ichiran", 35.66, 139.70).with_map_provider_id("mp"))
            .await
            .unwrap();

        let saved = repo.save(created.clone()).await.unwrap();
        assert_eq!(saved, created);
        assert_eq!(count(&repo).await, 1);
    }

    #[tokio::test]
    async fn test_save_matches_by_map_provider_id() {
        let repo = repo();
        let original = repo
            .create(spot("Old name", 1.0, 1.0).with_map_provider_id("mp"))
            .await
            .unwrap();

        // Same map-provider id, different local id and reason.
        let incoming = Spot::new("New name", Coordinate::new(2.0, 2.0), CreationReason::SearchResult)
            .with_map_provider_id("mp")
            .with_remote_id("remote-9");
        let saved = repo.save(incoming).await.unwrap();

        assert_eq!(saved.id, original.id);
        assert_eq!(saved.created_at, original.created_at);
        assert_eq!(saved.reason, CreationReason::Manual);
        assert_eq!(saved.name, "New name");
        assert_eq!(saved.coordinate, Coordinate::new(2.0, 2.0));
        assert_eq!(saved.remote_id.as_deref(), Some("remote-9"));

        assert_eq!(count(&repo).await, 1);
        assert_eq!(repo.fetch(original.id).await.unwrap(), saved);
    }

    #[tokio::test]
    async fn test_save_matches_by_remote_id() {
        let repo = repo();
        let original = repo
            .create(spot("Synced", 1.0, 1.0).with_remote_id("r-1"))
            .await
            .unwrap();

        let saved = repo
            .save(spot("Renamed", 1.0, 1.0).with_remote_id("r-1"))
            .await
            .unwrap();
        assert_eq!(saved.id, original.id);
        assert_eq!(saved.name, "Renamed");
        assert_eq!(count(&repo).await, 1);
    }

    #[tokio::test]
    async fn test_save_inserts_unknown_spot() {
        let repo = repo();
        let new = spot("Fresh", 3.0, 3.0);
        let saved = repo.save(new.clone()).await.unwrap();
        assert_eq!(saved, new);
        assert_eq!(repo.fetch(new.id).await.unwrap(), new);
    }

    #[tokio::test]
    async fn test_fetch_any_of_without_keys() {
        let repo = repo();
        let err = repo.fetch_any_of(&SpotKeys::new()).await.unwrap_err();
        assert_eq!(err, SpotError::NoIdsProvided);
    }

    #[tokio::test]
    async fn test_fetch_any_of_without_match() {
        let repo = repo();
        repo.create(spot("A", 0.0, 0.0)).await.unwrap();

        let keys = SpotKeys::new()
            .id(Uuid::new_v4())
            .map_provider_id("nope")
            .remote_id("nope");
        assert_eq!(repo.fetch_any_of(&keys).await.unwrap_err(), SpotError::NotFound);
        assert_eq!(
            repo.fetch(Uuid::new_v4()).await.unwrap_err(),
            SpotError::NotFound
        );
    }

    #[tokio::test]
    async fn test_fetch_any_of_priority() {
        let repo = repo();
        let by_id = repo.create(spot("by id", 0.0, 0.0)).await.unwrap();
        let by_mp = repo
            .create(spot("by mp", 0.0, 0.0).with_map_provider_id("mp"))
            .await
            .unwrap();
        let by_remote = repo
            .create(spot("by remote", 0.0, 0.0).with_remote_id("r"))
            .await
            .unwrap();

        let all = SpotKeys::new().id(by_id.id).map_provider_id("mp").remote_id("r");
        assert_eq!(repo.fetch_any_of(&all).await.unwrap(), by_id);

        let no_id = SpotKeys::new().map_provider_id("mp").remote_id("r");
        assert_eq!(repo.fetch_any_of(&no_id).await.unwrap(), by_mp);

        let stale_id = SpotKeys::new().id(Uuid::new_v4()).remote_id("r");
        assert_eq!(repo.fetch_any_of(&stale_id).await.unwrap(), by_remote);
    }

    #[tokio::test]
    async fn test_fetch_all_sorts_by_name() {
        let repo = repo();
        for name in ["Zulu", "Alpha", "Mike"] {
            repo.create(spot(name, 0.0, 0.0)).await.unwrap();
        }

        let asc = repo
            .fetch_all(&SpotQuery::new().by_name(SortDirection::Ascending))
            .await
            .unwrap();
        assert_eq!(names(&asc), ["Alpha", "Mike", "Zulu"]);

        let desc = repo
            .fetch_all(&SpotQuery::new().by_name(SortDirection::Descending))
            .await
            .unwrap();
        assert_eq!(names(&desc), ["Zulu", "Mike", "Alpha"]);
    }

    #[tokio::test]
    async fn test_name_ties_keep_insertion_order() {
        let repo = repo();
        let first = repo.create(spot("Same", 0.0, 0.0)).await.unwrap();
        let second = repo.create(spot("Same", 1.0, 1.0)).await.unwrap();
        repo.create(spot("Other", 0.0, 0.0)).await.unwrap();

        for direction in [SortDirection::Ascending, SortDirection::Descending] {
            let spots = repo
                .fetch_all(&SpotQuery::new().by_name(direction))
                .await
                .unwrap();
            let same: Vec<Uuid> = spots
                .iter()
                .filter(|s| s.name == "Same")
                .map(|s| s.id)
                .collect();
            assert_eq!(same, [first.id, second.id]);
        }
    }

    #[tokio::test]
    async fn test_fetch_all_by_distance_with_search() {
        let repo = repo();
        repo.create(spot("Ramen far", 0.0, 3.0)).await.unwrap();
        repo.create(spot("Sushi near", 0.0, 0.1)).await.unwrap();
        repo.create(spot("RAMEN near", 0.0, 1.0)).await.unwrap();

        let query = SpotQuery::new()
            .by_distance(Coordinate::new(0.0, 0.0), SortDirection::Ascending)
            .search("ramen");
        let spots = repo.fetch_all(&query).await.unwrap();
        assert_eq!(names(&spots), ["RAMEN near", "Ramen far"]);

        let everything = repo.fetch_all(&SpotQuery::new().search("")).await.unwrap();
        assert_eq!(everything.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_ids_in_bounding_box() {
        let repo = repo();
        let inside = repo.create(spot("inside", 35.5, 139.5)).await.unwrap();
        let corner = repo.create(spot("corner", 36.0, 140.0)).await.unwrap();
        repo.create(spot("outside", 34.0, 139.5)).await.unwrap();
        repo.create(spot("just outside", 36.000001, 139.5)).await.unwrap();

        let bounds = Rect::new(Coordinate::new(35.0, 139.0), Coordinate::new(36.0, 140.0));
        let ids = repo.fetch_ids_in(&bounds).await.unwrap();
        assert_eq!(ids, [inside.id, corner.id]);
    }

    #[tokio::test]
    async fn test_save_moves_index_entry_and_delete_removes_it() {
        let repo = repo();
        let bounds = Rect::new(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 1.0));
        let mut moving = repo.create(spot("mover", 0.5, 0.5)).await.unwrap();
        assert_eq!(repo.fetch_ids_in(&bounds).await.unwrap(), [moving.id]);

        moving.coordinate = Coordinate::new(10.0, 10.0);
        let moved = repo.save(moving).await.unwrap();
        assert!(repo.fetch_ids_in(&bounds).await.unwrap().is_empty());

        let far = Rect::new(Coordinate::new(9.0, 9.0), Coordinate::new(11.0, 11.0));
        assert_eq!(repo.fetch_ids_in(&far).await.unwrap(), [moved.id]);

        repo.delete(moved.id).await.unwrap();
        assert!(repo.fetch_ids_in(&far).await.unwrap().is_empty());
        let entries: i64 = repo
            .db
            .read(|conn| {
                conn.query_row("SELECT COUNT(*) FROM spot_locations", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(entries, 0);
    }

    #[tokio::test]
    async fn test_delete_missing_spot() {
        let repo = repo();
        assert_eq!(
            repo.delete(Uuid::new_v4()).await.unwrap_err(),
            SpotError::NotFound
        );
    }

    #[tokio::test]
    async fn test_cache_search_results_merges_by_map_provider_id() {
        let repo = repo();
        let found = vec![
            FoundSpot {
                name: "Tsuta".into(),
                coordinate: Coordinate::new(35.73, 139.72),
                map_provider_id: "mp-tsuta".into(),
            },
            FoundSpot {
                name: "Fuunji".into(),
                coordinate: Coordinate::new(35.69, 139.69),
                map_provider_id: "mp-fuunji".into(),
            },
        ];

        let first = repo.cache_search_results(&found).await.unwrap();
        assert_eq!(names(&first), ["Tsuta", "Fuunji"]);
        assert!(first.iter().all(|s| s.reason == CreationReason::SearchResult));

        let mut renamed = found.clone();
        renamed[0].name = "Tsuta Japanese Soba".into();
        let second = repo.cache_search_results(&renamed).await.unwrap();

        assert_eq!(count(&repo).await, 2);
        assert_eq!(second[0].id, first[0].id);
        assert_eq!(second[0].name, "Tsuta Japanese Soba");
        assert_eq!(second[1], first[1]);
    }

    #[tokio::test]
    async fn test_observe_emits_initial_and_per_write() {
        let repo = repo();
        let mut observation = repo.observe(SpotQuery::new()).await;
        assert_eq!(observation.next_within_timeout().await, Ok(Vec::new()));

        let created = repo.create(spot("Beta", 0.0, 0.0)).await.unwrap();
        let listing = observation.next_within_timeout().await.unwrap();
        assert_eq!(names(&listing), ["Beta"]);

        repo.create(spot("Alpha", 0.0, 0.0)).await.unwrap();
        let listing = observation.next_within_timeout().await.unwrap();
        assert_eq!(names(&listing), ["Alpha", "Beta"]);

        repo.delete(created.id).await.unwrap();
        let listing = observation.next_within_timeout().await.unwrap();
        assert_eq!(names(&listing), ["Alpha"]);
    }

    #[tokio::test]
    async fn test_observe_applies_query() {
        let repo = repo();
        repo.create(spot("Gyoza", 0.0, 0.0)).await.unwrap();
        let mut observation = repo.observe(SpotQuery::new().search("ramen")).await;
        assert_eq!(observation.next_within_timeout().await, Ok(Vec::new()));

        repo.create(spot("Ramen", 0.0, 0.0)).await.unwrap();
        let listing = observation.next_within_timeout().await.unwrap();
        assert_eq!(names(&listing), ["Ramen"]);
    }
}
