//! # SQLite Store
//!
//! Relational store for Users, Activities and TrackPoints.
//!
//! ## Schema
//!
//! - `User(id PK, has_labels)`
//! - `Activity(id PK auto, user_id FK, transportation_mode NULL, start_date_time, end_date_time)`
//!   with `UNIQUE (user_id, start_date_time, end_date_time)`
//! - `TrackPoint(id PK auto, activity_id FK, lat, lon, altitude, date_time)`
//!
//! Timestamps are stored as `YYYY-MM-DD HH:MM:SS` text so that exact-match
//! lookups on (user, start, end) compare equal strings. Foreign keys are
//! enforced.

use std::path::Path;

use chrono::NaiveDateTime;
use log::info;
use rusqlite::types::{Type, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::{IngestError, Result};
use crate::{
    Activity, NewActivity, TimeSpan, TrackPoint, TrackPointRecord, User, DATETIME_FORMAT,
};

/// Tables of the schema, in dependency order.
pub const TABLES: [&str; 3] = ["User", "Activity", "TrackPoint"];

/// Column description returned by [`GeoLifeStore::describe_table`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

/// Untyped rows returned by [`GeoLifeStore::peek_table`].
#[derive(Debug, Clone, Serialize)]
pub struct TableRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Format a timestamp the way it is stored.
pub fn format_datetime(value: &NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

/// Read a stored timestamp from column `idx` of `row`.
pub fn datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let text: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&text, DATETIME_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// SQLite-backed GeoLife store.
pub struct GeoLifeStore {
    db: Connection,
}

impl GeoLifeStore {
    // ========================================================================
    // Initialization
    // ========================================================================

    /// Open (or create) the database at `db_path` and ensure the schema.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db = Connection::open(db_path.as_ref())?;
        Self::from_connection(db)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(db: Connection) -> Result<Self> {
        db.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = Self { db };
        store.create_tables()?;
        Ok(store)
    }

    /// Create the three tables if they do not exist yet.
    pub fn create_tables(&self) -> Result<()> {
        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS User (
                id TEXT NOT NULL PRIMARY KEY,
                has_labels BOOLEAN NOT NULL
            );

            CREATE TABLE IF NOT EXISTS Activity (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                transportation_mode TEXT,
                start_date_time TEXT NOT NULL,
                end_date_time TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES User(id),
                UNIQUE (user_id, start_date_time, end_date_time)
            );

            CREATE TABLE IF NOT EXISTS TrackPoint (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                activity_id INTEGER NOT NULL,
                lat REAL NOT NULL,
                lon REAL NOT NULL,
                altitude INTEGER NOT NULL,
                date_time TEXT NOT NULL,
                FOREIGN KEY (activity_id) REFERENCES Activity(id)
            );

            CREATE INDEX IF NOT EXISTS idx_activity_mode ON Activity(transportation_mode);
            CREATE INDEX IF NOT EXISTS idx_trackpoint_activity ON TrackPoint(activity_id);
            "#,
        )?;
        Ok(())
    }

    /// Read-only access for the reporting catalogue.
    pub fn connection(&self) -> &Connection {
        &self.db
    }

    // ========================================================================
    // Inserts
    // ========================================================================

    /// Insert users, ignoring ids that already exist. Returns rows inserted.
    pub fn insert_users(&mut self, users: &[User]) -> Result<usize> {
        let tx = self.db.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO User (id, has_labels) VALUES (?1, ?2)")?;
            for user in users {
                inserted += stmt.execute(params![user.id, user.has_labels])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Insert activities in one transaction, logging progress every
    /// `batch_size` rows, and commit once.
    ///
    /// An activity whose (user, start, end) already exists is skipped.
    /// Returns rows inserted.
    pub fn insert_activities(
        &mut self,
        activities: &[NewActivity],
        batch_size: usize,
    ) -> Result<usize> {
        let batch_size = batch_size.max(1);
        let batch_count = activities.len().div_ceil(batch_size);
        let tx = self.db.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO Activity
                 (user_id, transportation_mode, start_date_time, end_date_time)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (i, batch) in activities.chunks(batch_size).enumerate() {
                for activity in batch {
                    inserted += stmt.execute(params![
                        activity.user_id,
                        activity.transportation_mode,
                        format_datetime(&activity.span.start),
                        format_datetime(&activity.span.end),
                    ])?;
                }
                info!(
                    "[Store] Activity batch {}/{} ({}/{} submitted)",
                    i + 1,
                    batch_count,
                    (i * batch_size + batch.len()),
                    activities.len()
                );
            }
        }
        info!("[Store] Committing {} activities", inserted);
        tx.commit()?;
        Ok(inserted)
    }

    /// Insert `(activity_id, point)` rows in one transaction, logging
    /// progress every `batch_size` rows, and commit once. Returns rows
    /// inserted.
    pub fn insert_trackpoints(
        &mut self,
        points: &[(i64, TrackPointRecord)],
        batch_size: usize,
    ) -> Result<usize> {
        let batch_size = batch_size.max(1);
        let batch_count = points.len().div_ceil(batch_size);
        let tx = self.db.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO TrackPoint (activity_id, lat, lon, altitude, date_time)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (i, batch) in points.chunks(batch_size).enumerate() {
                for (activity_id, point) in batch {
                    inserted += stmt.execute(params![
                        activity_id,
                        point.latitude,
                        point.longitude,
                        point.altitude,
                        format_datetime(&point.date_time),
                    ])?;
                }
                info!(
                    "[Store] TrackPoint batch {}/{} ({}/{} submitted)",
                    i + 1,
                    batch_count,
                    (i * batch_size + batch.len()),
                    points.len()
                );
            }
        }
        info!("[Store] Committing {} trackpoints", inserted);
        tx.commit()?;
        Ok(inserted)
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Id of the Activity with exactly this user and span.
    pub fn find_activity_id(&self, user_id: &str, span: &TimeSpan) -> Result<Option<i64>> {
        let id = self
            .db
            .query_row(
                "SELECT id FROM Activity
                 WHERE user_id = ?1 AND start_date_time = ?2 AND end_date_time = ?3",
                params![
                    user_id,
                    format_datetime(&span.start),
                    format_datetime(&span.end)
                ],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Whether any TrackPoint references `activity_id`.
    pub fn has_trackpoints(&self, activity_id: i64) -> Result<bool> {
        let exists: bool = self.db.query_row(
            "SELECT EXISTS(SELECT 1 FROM TrackPoint WHERE activity_id = ?1)",
            params![activity_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// All users ordered by id.
    pub fn users(&self) -> Result<Vec<User>> {
        let mut stmt = self.db.prepare("SELECT id, has_labels FROM User ORDER BY id")?;
        let users = stmt
            .query_map([], |row| {
                Ok(User {
                    id: row.get(0)?,
                    has_labels: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    /// Activities of a user ordered by start time.
    pub fn activities_for_user(&self, user_id: &str) -> Result<Vec<Activity>> {
        let mut stmt = self.db.prepare(
            "SELECT id, user_id, transportation_mode, start_date_time, end_date_time
             FROM Activity WHERE user_id = ?1
             ORDER BY start_date_time, id",
        )?;
        let activities = stmt
            .query_map(params![user_id], |row| {
                Ok(Activity {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    transportation_mode: row.get(2)?,
                    span: TimeSpan {
                        start: datetime_column(row, 3)?,
                        end: datetime_column(row, 4)?,
                    },
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(activities)
    }

    /// TrackPoints of an Activity in insertion order.
    pub fn track_points(&self, activity_id: i64) -> Result<Vec<TrackPoint>> {
        let mut stmt = self.db.prepare(
            "SELECT id, activity_id, lat, lon, altitude, date_time
             FROM TrackPoint WHERE activity_id = ?1 ORDER BY id",
        )?;
        let points = stmt
            .query_map(params![activity_id], |row| {
                Ok(TrackPoint {
                    id: row.get(0)?,
                    activity_id: row.get(1)?,
                    record: TrackPointRecord {
                        latitude: row.get(2)?,
                        longitude: row.get(3)?,
                        altitude: row.get(4)?,
                        date_time: datetime_column(row, 5)?,
                    },
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(points)
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Schema tables present in the database.
    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.db.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    /// Column layout of one schema table.
    pub fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let table = schema_table(table)?;
        let mut stmt = self
            .db
            .prepare(&format!("PRAGMA table_info(\"{}\")", table))?;
        let columns = stmt
            .query_map([], |row| {
                Ok(ColumnInfo {
                    name: row.get(1)?,
                    data_type: row.get(2)?,
                    not_null: row.get::<_, i64>(3)? != 0,
                    primary_key: row.get::<_, i64>(5)? > 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    /// First `limit` rows of one schema table, rendered as text.
    pub fn peek_table(&self, table: &str, limit: u32) -> Result<TableRows> {
        let table = schema_table(table)?;
        let mut stmt = self
            .db
            .prepare(&format!("SELECT * FROM \"{}\" ORDER BY rowid LIMIT ?1", table))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();
        let rows = stmt
            .query_map(params![limit], |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(render_value))
                    .collect::<rusqlite::Result<Vec<String>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(TableRows { columns, rows })
    }
}

/// Canonical name of a schema table, matched case-insensitively.
fn schema_table(name: &str) -> Result<&'static str> {
    TABLES
        .iter()
        .copied()
        .find(|table| table.eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            IngestError::config(format!(
                "unknown table '{}' (expected one of {})",
                name,
                TABLES.join(", ")
            ))
        })
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

// ============================================================================
// Tests
// ============================================================================
