//! Altitude gain per user.
//!
//! Positive deltas between consecutive TrackPoints of the same Activity are
//! summed per user. Samples at the unknown sentinel are dropped before
//! comparison: they neither contribute nor reset the baseline, so the next
//! known altitude is compared with the last known one of that Activity.

use rusqlite::Connection;
use serde::Serialize;

use crate::error::Result;
use crate::ALTITUDE_UNKNOWN;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AltitudeGain {
    pub user_id: String,
    /// Feet, as recorded in the dataset
    pub altitude_gain: i64,
}

/// Accumulates gain from samples ordered by user, Activity, then time.
#[derive(Debug, Default)]
pub struct AltitudeGainAccumulator {
    gains: Vec<AltitudeGain>,
    last_activity: Option<i64>,
    last_altitude: Option<i32>,
}

impl AltitudeGainAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, user_id: &str, activity_id: i64, altitude: i32) {
        if altitude == ALTITUDE_UNKNOWN {
            return;
        }

        let same_user = self.gains.last().is_some_and(|g| g.user_id == user_id);
        if !same_user {
            self.gains.push(AltitudeGain {
                user_id: user_id.to_string(),
                altitude_gain: 0,
            });
            self.last_activity = None;
        }
        if self.last_activity != Some(activity_id) {
            self.last_altitude = None;
        }

        if let (Some(previous), Some(current)) = (self.last_altitude, self.gains.last_mut()) {
            if altitude > previous {
                current.altitude_gain += i64::from(altitude - previous);
            }
        }

        self.last_activity = Some(activity_id);
        self.last_altitude = Some(altitude);
    }

    /// Users by gain, highest first, at most `limit` of them.
    pub fn top(mut self, limit: usize) -> Vec<AltitudeGain> {
        self.gains.sort_by(|a, b| {
            b.altitude_gain
                .cmp(&a.altitude_gain)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        self.gains.truncate(limit);
        self.gains
    }
}

/// The `limit` users with the highest total altitude gain.
pub fn altitude_gain_per_user(conn: &Connection, limit: u32) -> Result<Vec<AltitudeGain>> {
    let mut stmt = conn.prepare(
        "SELECT Activity.user_id, Activity.id, TrackPoint.altitude
         FROM Activity
         JOIN TrackPoint ON Activity.id = TrackPoint.activity_id
         ORDER BY Activity.user_id, Activity.id, TrackPoint.date_time, TrackPoint.id",
    )?;

    let mut accumulator = AltitudeGainAccumulator::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let user_id: String = row.get(0)?;
        accumulator.push(&user_id, row.get(1)?, row.get(2)?);
    }
    Ok(accumulator.top(limit as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gain_of(samples: &[(&str, i64, i32)]) -> Vec<AltitudeGain> {
        let mut acc = AltitudeGainAccumulator::new();
        for (user, activity, altitude) in samples {
            acc.push(user, *activity, *altitude);
        }
        acc.top(20)
    }

    #[test]
    fn test_only_positive_deltas_count() {
        let gains = gain_of(&[("000", 1, 10), ("000", 1, 5), ("000", 1, 20)]);
        assert_eq!(gains[0].altitude_gain, 15);
    }

    #[test]
    fn test_sentinel_is_skipped_without_reset() {
        // 5 -> 20 gains 15, -777 is dropped, 20 -> 30 gains 10
        let gains = gain_of(&[
            ("000", 1, 10),
            ("000", 1, 5),
            ("000", 1, 20),
            ("000", 1, ALTITUDE_UNKNOWN),
            ("000", 1, 30),
        ]);
        assert_eq!(gains[0].altitude_gain, 25);
    }

    #[test]
    fn test_activity_boundary_resets_baseline() {
        let gains = gain_of(&[("000", 1, 10), ("000", 2, 500), ("000", 2, 510)]);
        assert_eq!(gains[0].altitude_gain, 10);
    }

    #[test]
    fn test_user_boundary_resets_and_sorts() {
        let gains = gain_of(&[
            ("000", 1, 10),
            ("000", 1, 20),
            ("001", 1, 100),
            ("001", 1, 200),
            ("002", 5, 0),
        ]);
        assert_eq!(gains.len(), 3);
        assert_eq!(gains[0].user_id, "001");
        assert_eq!(gains[0].altitude_gain, 100);
        assert_eq!(gains[1].user_id, "000");
        assert_eq!(gains[1].altitude_gain, 10);
        assert_eq!(gains[2].altitude_gain, 0);
    }

    #[test]
    fn test_top_truncates() {
        let mut acc = AltitudeGainAccumulator::new();
        for user in 0..30 {
            let id = format!("{:03}", user);
            acc.push(&id, user, 0);
            acc.push(&id, user, user as i32);
        }
        let top = acc.top(20);
        assert_eq!(top.len(), 20);
        assert_eq!(top[0].user_id, "029");
    }
}
