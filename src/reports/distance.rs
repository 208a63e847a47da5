//! Walked distance of one user in one year.
//!
//! Great-circle distance is summed between chronologically consecutive
//! TrackPoints of the same `walk` Activity. The running position resets
//! whenever the Activity changes, so no segment spans two Activities.

use geo::{Distance, Haversine, Point};
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalkedDistance {
    pub user_id: String,
    pub year: i32,
    pub km: f64,
}

/// Haversine distance in kilometres between two lat/lon positions.
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let from = Point::new(from.1, from.0);
    let to = Point::new(to.1, to.0);
    Haversine::distance(from, to) / 1000.0
}

/// Sums distances per Activity from samples ordered by Activity then time.
#[derive(Debug, Default)]
pub struct DistanceAccumulator {
    last: Option<(i64, (f64, f64))>,
    total_km: f64,
}

impl DistanceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, activity_id: i64, lat: f64, lon: f64) {
        let position = (lat, lon);
        if let Some((last_activity, last_position)) = self.last {
            if last_activity == activity_id {
                self.total_km += haversine_km(last_position, position);
            }
        }
        self.last = Some((activity_id, position));
    }

    pub fn total_km(&self) -> f64 {
        self.total_km
    }
}

/// Kilometres walked by `user_id` in `year`.
pub fn walked_distance(conn: &Connection, user_id: &str, year: i32) -> Result<WalkedDistance> {
    let mut stmt = conn.prepare(
        "SELECT Activity.id, TrackPoint.lat, TrackPoint.lon
         FROM Activity
         JOIN TrackPoint ON Activity.id = TrackPoint.activity_id
         WHERE Activity.user_id = ?1
           AND strftime('%Y', TrackPoint.date_time) = ?2
           AND Activity.transportation_mode = 'walk'
         ORDER BY Activity.id, TrackPoint.date_time, TrackPoint.id",
    )?;

    let mut accumulator = DistanceAccumulator::new();
    let mut rows = stmt.query(params![user_id, format!("{:04}", year)])?;
    while let Some(row) = rows.next()? {
        accumulator.push(row.get(0)?, row.get(1)?, row.get(2)?);
    }

    Ok(WalkedDistance {
        user_id: user_id.to_string(),
        year,
        km: accumulator.total_km(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: (f64, f64) = (39.984702, 116.318417);
    const B: (f64, f64) = (39.994622, 116.326757);

    #[test]
    fn test_haversine_known_distance() {
        // one degree of latitude on the mean-radius sphere
        let d = haversine_km((0.0, 0.0), (1.0, 0.0));
        assert!((d - 111.195).abs() < 0.01, "got {}", d);
        assert_eq!(haversine_km(A, A), 0.0);
    }

    #[test]
    fn test_same_activity_sums_segment() {
        let mut acc = DistanceAccumulator::new();
        acc.push(1, A.0, A.1);
        acc.push(1, B.0, B.1);
        assert!((acc.total_km() - haversine_km(A, B)).abs() < 1e-12);
    }

    #[test]
    fn test_activity_boundary_resets() {
        let mut acc = DistanceAccumulator::new();
        acc.push(1, A.0, A.1);
        acc.push(2, B.0, B.1);
        assert_eq!(acc.total_km(), 0.0);
    }

    #[test]
    fn test_multiple_activities_accumulate() {
        let mut acc = DistanceAccumulator::new();
        acc.push(1, A.0, A.1);
        acc.push(1, B.0, B.1);
        acc.push(2, B.0, B.1);
        acc.push(2, A.0, A.1);
        assert!((acc.total_km() - 2.0 * haversine_km(A, B)).abs() < 1e-9);
    }
}
