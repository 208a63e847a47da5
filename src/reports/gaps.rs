//! Gap detection.
//!
//! An Activity is invalid when two of its TrackPoints that are adjacent by
//! row id are more than the configured number of minutes apart. The report
//! counts invalid Activities per user; users without any are omitted.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;
use serde::Serialize;

use crate::error::Result;
use crate::store::datetime_column;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidActivityCount {
    pub user_id: String,
    pub invalid_activities: i64,
}

/// Flags Activities from samples ordered by user, Activity, then row id.
#[derive(Debug)]
pub struct GapDetector {
    max_gap: Duration,
    invalid: BTreeMap<String, i64>,
    last: Option<(i64, NaiveDateTime)>,
    flagged_current: bool,
}

impl GapDetector {
    pub fn new(max_gap: Duration) -> Self {
        Self {
            max_gap,
            invalid: BTreeMap::new(),
            last: None,
            flagged_current: false,
        }
    }

    pub fn push(&mut self, user_id: &str, activity_id: i64, date_time: NaiveDateTime) {
        match self.last {
            Some((last_activity, last_time)) if last_activity == activity_id => {
                let gap = (date_time - last_time).abs();
                if gap > self.max_gap && !self.flagged_current {
                    *self.invalid.entry(user_id.to_string()).or_insert(0) += 1;
                    self.flagged_current = true;
                }
            }
            _ => self.flagged_current = false,
        }
        self.last = Some((activity_id, date_time));
    }

    /// Invalid Activity counts ordered by user id.
    pub fn finish(self) -> Vec<InvalidActivityCount> {
        self.invalid
            .into_iter()
            .map(|(user_id, invalid_activities)| InvalidActivityCount {
                user_id,
                invalid_activities,
            })
            .collect()
    }
}

/// Count Activities with a gap longer than `max_gap_minutes`, per user.
pub fn invalid_activities_per_user(
    conn: &Connection,
    max_gap_minutes: i64,
) -> Result<Vec<InvalidActivityCount>> {
    let mut stmt = conn.prepare(
        "SELECT Activity.user_id, TrackPoint.activity_id, TrackPoint.date_time
         FROM Activity
         JOIN TrackPoint ON Activity.id = TrackPoint.activity_id
         ORDER BY Activity.user_id, TrackPoint.activity_id, TrackPoint.id",
    )?;

    let mut detector = GapDetector::new(Duration::minutes(max_gap_minutes));
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let user_id: String = row.get(0)?;
        detector.push(&user_id, row.get(1)?, datetime_column(row, 2)?);
    }
    Ok(detector.finish())
}
