//! Aggregate reports answered entirely by SQL.

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::Result;

/// Row counts of the three tables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TableCounts {
    pub users: i64,
    pub activities: i64,
    pub trackpoints: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserActivityCount {
    pub user_id: String,
    pub activity_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeCount {
    pub transportation_mode: String,
    pub activity_count: i64,
}

/// Activities started in one year and their summed duration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearSummary {
    pub year: i32,
    pub activity_count: i64,
    /// Whole minutes per activity, summed, in hours
    pub total_hours: f64,
}

/// Most frequent transportation mode of a labeled user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserMode {
    pub user_id: String,
    pub transportation_mode: String,
    pub activity_count: i64,
}

/// Half-open latitude/longitude box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Region {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Points whose coordinates start with `39.916` / `116.397` (the
/// Forbidden City, Beijing).
pub const FORBIDDEN_CITY: Region = Region {
    min_lat: 39.916,
    max_lat: 39.917,
    min_lon: 116.397,
    max_lon: 116.398,
};

pub fn table_counts(conn: &Connection) -> Result<TableCounts> {
    let counts = conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM User),
            (SELECT COUNT(*) FROM Activity),
            (SELECT COUNT(*) FROM TrackPoint)",
        [],
        |row| {
            Ok(TableCounts {
                users: row.get(0)?,
                activities: row.get(1)?,
                trackpoints: row.get(2)?,
            })
        },
    )?;
    Ok(counts)
}

/// Mean number of activities per user, users without activities included.
pub fn average_activities_per_user(conn: &Connection) -> Result<f64> {
    let average: Option<f64> = conn.query_row(
        "SELECT AVG(activity_count) FROM (
            SELECT User.id, COUNT(Activity.id) AS activity_count
            FROM User
            LEFT JOIN Activity ON User.id = Activity.user_id
            GROUP BY User.id
        )",
        [],
        |row| row.get(0),
    )?;
    Ok(average.unwrap_or(0.0))
}

/// The `limit` users with the most activities.
pub fn top_users_by_activities(conn: &Connection, limit: u32) -> Result<Vec<UserActivityCount>> {
    let mut stmt = conn.prepare(
        "SELECT User.id, COUNT(Activity.id) AS activity_count
         FROM User
         LEFT JOIN Activity ON User.id = Activity.user_id
         GROUP BY User.id
         ORDER BY activity_count DESC, User.id ASC
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(params![limit], |row| {
            Ok(UserActivityCount {
                user_id: row.get(0)?,
                activity_count: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Users with at least one activity in `mode`.
pub fn users_with_mode(conn: &Connection, mode: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT User.id
         FROM User
         JOIN Activity ON User.id = Activity.user_id
         WHERE Activity.transportation_mode = ?1
         ORDER BY User.id",
    )?;
    let users = stmt
        .query_map(params![mode], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(users)
}

pub fn taxi_users(conn: &Connection) -> Result<Vec<String>> {
    users_with_mode(conn, "taxi")
}

/// Activity count per non-null transportation mode.
pub fn mode_counts(conn: &Connection) -> Result<Vec<ModeCount>> {
    let mut stmt = conn.prepare(
        "SELECT transportation_mode, COUNT(id) AS activity_count
         FROM Activity
         WHERE transportation_mode IS NOT NULL
         GROUP BY transportation_mode
         ORDER BY activity_count DESC, transportation_mode",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ModeCount {
                transportation_mode: row.get(0)?,
                activity_count: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Activity count and duration grouped by start year, busiest year first.
pub fn activities_per_year(conn: &Connection) -> Result<Vec<YearSummary>> {
    let mut stmt = conn.prepare(
        "SELECT CAST(strftime('%Y', start_date_time) AS INTEGER) AS activity_year,
                COUNT(*) AS activity_count,
                SUM((CAST(strftime('%s', end_date_time) AS INTEGER)
                     - CAST(strftime('%s', start_date_time) AS INTEGER)) / 60) / 60.0 AS total_hours
         FROM Activity
         GROUP BY activity_year
         ORDER BY activity_count DESC, activity_year",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(YearSummary {
                year: row.get(0)?,
                activity_count: row.get(1)?,
                total_hours: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Most used mode per labeled user. Ties go to the alphabetically first mode.
pub fn most_used_modes(conn: &Connection) -> Result<Vec<UserMode>> {
    let mut stmt = conn.prepare(
        "WITH TransportationCount AS (
            SELECT User.id AS user_id,
                   Activity.transportation_mode AS mode,
                   COUNT(*) AS mode_count
            FROM User
            JOIN Activity ON User.id = Activity.user_id
            WHERE User.has_labels = 1 AND Activity.transportation_mode IS NOT NULL
            GROUP BY User.id, Activity.transportation_mode
        ),
        RankedTransportation AS (
            SELECT user_id, mode, mode_count,
                   ROW_NUMBER() OVER (
                       PARTITION BY user_id ORDER BY mode_count DESC, mode ASC
                   ) AS mode_rank
            FROM TransportationCount
        )
        SELECT user_id, mode, mode_count
        FROM RankedTransportation
        WHERE mode_rank = 1
        ORDER BY user_id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(UserMode {
                user_id: row.get(0)?,
                transportation_mode: row.get(1)?,
                activity_count: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Users with at least one TrackPoint inside `region`.
pub fn users_in_region(conn: &Connection, region: &Region) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT Activity.user_id
         FROM Activity
         JOIN TrackPoint ON Activity.id = TrackPoint.activity_id
         WHERE TrackPoint.lat >= ?1 AND TrackPoint.lat < ?2
           AND TrackPoint.lon >= ?3 AND TrackPoint.lon < ?4
         ORDER BY Activity.user_id",
    )?;
    let users = stmt
        .query_map(
            params![region.min_lat, region.max_lat, region.min_lon, region.max_lon],
            |row| row.get(0),
        )?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(users)
}

pub fn forbidden_city_users(conn: &Connection) -> Result<Vec<String>> {
    users_in_region(conn, &FORBIDDEN_CITY)
}
