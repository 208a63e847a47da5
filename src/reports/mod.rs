//! # Reporting Catalogue
//!
//! Fixed, read-only analytical queries over the loaded schema. Each report
//! is a free function from a store connection to typed rows and does not
//! depend on any other report.
//!
//! Reports that accumulate over ordered TrackPoints (distance, altitude,
//! gaps) stream rows into a small accumulator that can be tested without a
//! database.

use std::fmt;
use std::str::FromStr;

use rusqlite::Connection;
use serde::Serialize;

use crate::config::ReportConfig;
use crate::error::{IngestError, Result};

pub mod altitude;
pub mod distance;
pub mod gaps;
pub mod summary;

pub use altitude::{altitude_gain_per_user, AltitudeGain, AltitudeGainAccumulator};
pub use distance::{haversine_km, walked_distance, DistanceAccumulator, WalkedDistance};
pub use gaps::{invalid_activities_per_user, GapDetector, InvalidActivityCount};
pub use summary::{
    activities_per_year, average_activities_per_user, forbidden_city_users, mode_counts,
    most_used_modes, table_counts, taxi_users, top_users_by_activities, users_in_region,
    users_with_mode, ModeCount, Region, TableCounts, UserActivityCount, UserMode, YearSummary,
    FORBIDDEN_CITY,
};

/// Every report of the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Counts,
    AverageActivities,
    TopUsers,
    TaxiUsers,
    ModeCounts,
    Years,
    WalkedDistance,
    AltitudeGain,
    InvalidActivities,
    ForbiddenCity,
    TopModes,
}

impl ReportKind {
    pub const ALL: [ReportKind; 11] = [
        ReportKind::Counts,
        ReportKind::AverageActivities,
        ReportKind::TopUsers,
        ReportKind::TaxiUsers,
        ReportKind::ModeCounts,
        ReportKind::Years,
        ReportKind::WalkedDistance,
        ReportKind::AltitudeGain,
        ReportKind::InvalidActivities,
        ReportKind::ForbiddenCity,
        ReportKind::TopModes,
    ];

    /// Command-line name of the report.
    pub fn name(&self) -> &'static str {
        match self {
            ReportKind::Counts => "counts",
            ReportKind::AverageActivities => "average-activities",
            ReportKind::TopUsers => "top-users",
            ReportKind::TaxiUsers => "taxi-users",
            ReportKind::ModeCounts => "mode-counts",
            ReportKind::Years => "years",
            ReportKind::WalkedDistance => "walked-distance",
            ReportKind::AltitudeGain => "altitude-gain",
            ReportKind::InvalidActivities => "invalid-activities",
            ReportKind::ForbiddenCity => "forbidden-city",
            ReportKind::TopModes => "top-modes",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReportKind {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        ReportKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| IngestError::config(format!("unknown report '{}'", s)))
    }
}

/// Result of one report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportOutput {
    Counts(TableCounts),
    Average(f64),
    UserCounts(Vec<UserActivityCount>),
    Users(Vec<String>),
    ModeCounts(Vec<ModeCount>),
    Years(Vec<YearSummary>),
    Distance(WalkedDistance),
    AltitudeGains(Vec<AltitudeGain>),
    InvalidActivities(Vec<InvalidActivityCount>),
    UserModes(Vec<UserMode>),
}

/// Run one report against `conn`.
pub fn run_report(conn: &Connection, kind: ReportKind, config: &ReportConfig) -> Result<ReportOutput> {
    let output = match kind {
        ReportKind::Counts => ReportOutput::Counts(table_counts(conn)?),
        ReportKind::AverageActivities => ReportOutput::Average(average_activities_per_user(conn)?),
        ReportKind::TopUsers => {
            ReportOutput::UserCounts(top_users_by_activities(conn, config.top_n)?)
        }
        ReportKind::TaxiUsers => ReportOutput::Users(taxi_users(conn)?),
        ReportKind::ModeCounts => ReportOutput::ModeCounts(mode_counts(conn)?),
        ReportKind::Years => ReportOutput::Years(activities_per_year(conn)?),
        ReportKind::WalkedDistance => ReportOutput::Distance(walked_distance(
            conn,
            &config.walk_user,
            config.walk_year,
        )?),
        ReportKind::AltitudeGain => {
            ReportOutput::AltitudeGains(altitude_gain_per_user(conn, config.top_n)?)
        }
        ReportKind::InvalidActivities => ReportOutput::InvalidActivities(
            invalid_activities_per_user(conn, config.max_gap_minutes)?,
        ),
        ReportKind::ForbiddenCity => ReportOutput::Users(forbidden_city_users(conn)?),
        ReportKind::TopModes => ReportOutput::UserModes(most_used_modes(conn)?),
    };
    Ok(output)
}
