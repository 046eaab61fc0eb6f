//! Core TripStore implementation

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::StoreError;

/// A stored trip row
///
/// `kind` holds the mode tag (`ITINERARY` or `BOARD`); the store does not
/// interpret it or the JSON columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRow {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub kind: String,
    pub source_url: Option<String>,
    pub preferences: serde_json::Value,
    pub result_data: serde_json::Value,
    pub owner_id: String,
}

/// Payload for inserting a new row. The id and timestamp are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewTripRow {
    pub kind: String,
    pub source_url: Option<String>,
    pub preferences: serde_json::Value,
    pub result_data: serde_json::Value,
    pub owner_id: String,
}

/// In-place update of an existing row
#[derive(Debug, Clone)]
pub struct TripRowUpdate {
    pub kind: String,
    pub preferences: serde_json::Value,
    pub result_data: serde_json::Value,
}

/// SQLite-backed trip store
#[derive(Debug)]
pub struct TripStore {
    base_path: PathBuf,
    conn: Connection,
}

impl TripStore {
    /// Open or create a store in the given directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        let conn = Connection::open(base_path.join(crate::DB_FILE))?;
        let store = Self { base_path, conn };
        store.migrate()?;
        info!(base_path = %store.base_path.display(), "TripStore opened");
        Ok(store)
    }

    /// Open a throwaway in-memory store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            base_path: PathBuf::from(":memory:"),
            conn,
        };
        store.migrate()?;
        Ok(store)
    }

    /// Directory holding the database file
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn migrate(&self) -> Result<(), StoreError> {
        debug!("migrate: called");
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS trips (
              id TEXT PRIMARY KEY,
              created_at TEXT NOT NULL,
              created_at_ms INTEGER NOT NULL,
              type TEXT NOT NULL,
              source_url TEXT,
              preferences TEXT NOT NULL,
              result_data TEXT NOT NULL,
              user_id TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS trips_owner_created
              ON trips(user_id, created_at_ms DESC);
            "#,
        )?;
        Ok(())
    }

    /// Insert a new row and return its assigned id
    pub fn insert(&mut self, row: NewTripRow) -> Result<String, StoreError> {
        debug!(owner_id = %row.owner_id, kind = %row.kind, "insert: called");
        if row.owner_id.trim().is_empty() {
            return Err(StoreError::InvalidInput("owner id must not be empty"));
        }

        let id = Uuid::now_v7().to_string();
        let now_ms = crate::now_ms();
        let created_at = ms_to_datetime(now_ms);

        self.conn.execute(
            r#"
            INSERT INTO trips(id, created_at, created_at_ms, type, source_url, preferences, result_data, user_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                id,
                created_at.to_rfc3339(),
                now_ms,
                row.kind,
                row.source_url,
                serde_json::to_string(&row.preferences)?,
                serde_json::to_string(&row.result_data)?,
                row.owner_id,
            ],
        )?;

        info!(%id, "Inserted trip");
        Ok(id)
    }

    /// Update a row owned by `owner_id`. Returns false when no such row exists for that owner.
    pub fn update(&mut self, owner_id: &str, id: &str, update: TripRowUpdate) -> Result<bool, StoreError> {
        debug!(%owner_id, %id, kind = %update.kind, "update: called");
        let changed = self.conn.execute(
            r#"
            UPDATE trips SET type = ?1, preferences = ?2, result_data = ?3
            WHERE id = ?4 AND user_id = ?5
            "#,
            params![
                update.kind,
                serde_json::to_string(&update.preferences)?,
                serde_json::to_string(&update.result_data)?,
                id,
                owner_id,
            ],
        )?;
        debug!(changed, "update: done");
        Ok(changed > 0)
    }

    /// All rows owned by `owner_id`, newest first
    pub fn list_by_owner(&self, owner_id: &str) -> Result<Vec<TripRow>, StoreError> {
        debug!(%owner_id, "list_by_owner: called");
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, created_at_ms, type, source_url, preferences, result_data, user_id
            FROM trips
            WHERE user_id = ?1
            ORDER BY created_at_ms DESC, id DESC
            "#,
        )?;

        let raw = stmt
            .query_map(params![owner_id], read_raw)?
            .collect::<Result<Vec<_>, _>>()?;

        let rows = raw.into_iter().map(RawRow::decode).collect::<Result<Vec<_>, _>>()?;
        debug!(count = rows.len(), "list_by_owner: done");
        Ok(rows)
    }

    /// Fetch one row owned by `owner_id`
    pub fn get(&self, owner_id: &str, id: &str) -> Result<Option<TripRow>, StoreError> {
        debug!(%owner_id, %id, "get: called");
        let raw = self
            .conn
            .query_row(
                r#"
                SELECT id, created_at_ms, type, source_url, preferences, result_data, user_id
                FROM trips
                WHERE id = ?1 AND user_id = ?2
                "#,
                params![id, owner_id],
                read_raw,
            )
            .optional()?;

        raw.map(RawRow::decode).transpose()
    }

    /// Delete a row owned by `owner_id`. Returns false when nothing was deleted.
    pub fn delete(&mut self, owner_id: &str, id: &str) -> Result<bool, StoreError> {
        debug!(%owner_id, %id, "delete: called");
        let deleted = self
            .conn
            .execute("DELETE FROM trips WHERE id = ?1 AND user_id = ?2", params![id, owner_id])?;
        if deleted > 0 {
            info!(%id, "Deleted trip");
        }
        Ok(deleted > 0)
    }
}

struct RawRow {
    id: String,
    created_at_ms: i64,
    kind: String,
    source_url: Option<String>,
    preferences: String,
    result_data: String,
    owner_id: String,
}

impl RawRow {
    fn decode(self) -> Result<TripRow, StoreError> {
        Ok(TripRow {
            id: self.id,
            created_at: ms_to_datetime(self.created_at_ms),
            kind: self.kind,
            source_url: self.source_url,
            preferences: serde_json::from_str(&self.preferences)?,
            result_data: serde_json::from_str(&self.result_data)?,
            owner_id: self.owner_id,
        })
    }
}

fn read_raw(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        created_at_ms: row.get(1)?,
        kind: row.get(2)?,
        source_url: row.get(3)?,
        preferences: row.get(4)?,
        result_data: row.get(5)?,
        owner_id: row.get(6)?,
    })
}

fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}
