//! # GeoLife Ingest
//!
//! Loads GeoLife GPS trajectory logs into a relational schema of Users,
//! Activities and TrackPoints, then runs a fixed catalogue of analytical
//! reports over the loaded data.
//!
//! Data flows one way:
//!
//! 1. [`validator`] classifies every `.plt` file by line count
//! 2. [`labels`] loads the users that have transportation-mode labels
//! 3. [`trajectory`] parses spans and rows of valid files
//! 4. [`matcher`] resolves a mode by exact span equality
//! 5. [`loader`] batches Activities and TrackPoints into the [`store`]
//! 6. [`reports`] query the store
//!
//! ## Quick Start
//!
//! ```no_run
//! use geolife::{scan_trajectory_files, GeoLifeStore, IngestConfig, LabelIndex, Loader};
//!
//! let config = IngestConfig::default();
//! let valid_files = scan_trajectory_files(&config).unwrap();
//! let labels = LabelIndex::load(&config.labeled_ids_path).unwrap();
//!
//! let mut store = GeoLifeStore::new("geolife.db").unwrap();
//! let loader = Loader::new(&config, &valid_files, &labels);
//! loader.load_all(&mut store).unwrap();
//!
//! let counts = geolife::reports::table_counts(store.connection()).unwrap();
//! println!("{} trackpoints", counts.trackpoints);
//! ```

use chrono::NaiveDateTime;
use serde::Serialize;

pub mod error;
pub use error::{IngestError, Result};

pub mod config;
pub use config::{IngestConfig, ReportConfig};

// File Validator
pub mod validator;
pub use validator::{scan_trajectory_files, ValidityMap};

// Label Index
pub mod labels;
pub use labels::LabelIndex;

// Trajectory Parser
pub mod trajectory;
pub use trajectory::{read_time_span, read_track_points, user_id_from_path};

// Label Matcher
pub mod matcher;
pub use matcher::{find_matching_mode, Label, LabelMatcher};

// SQLite store
pub mod store;
pub use store::GeoLifeStore;

// Two-phase bulk loader
pub mod loader;
pub use loader::{
    ActivityLoadSummary, LoadSummary, Loader, TrackPointLoadSummary, UserLoadSummary,
};

// Reporting catalogue
pub mod reports;

// Table/JSON rendering for the CLI
pub mod output;

// ============================================================================
// Core Types
// ============================================================================

/// Timestamp format of `.plt` rows and of stored `DATETIME` columns.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Altitude sentinel meaning "unknown".
pub const ALTITUDE_UNKNOWN: i32 = -777;

/// Start and end of an Activity, to the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeSpan {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeSpan {
    /// Length of the span in whole seconds.
    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

/// A user directory of the dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: String,
    pub has_labels: bool,
}

/// An Activity ready to be inserted; the store assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub user_id: String,
    pub transportation_mode: Option<String>,
    pub span: TimeSpan,
}

/// A stored Activity.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub id: i64,
    pub user_id: String,
    pub transportation_mode: Option<String>,
    pub span: TimeSpan,
}

/// One parsed `.plt` data row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPointRecord {
    pub latitude: f64,
    pub longitude: f64,
    /// Feet; [`ALTITUDE_UNKNOWN`] when not recorded
    pub altitude: i32,
    pub date_time: NaiveDateTime,
}

/// A stored TrackPoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub id: i64,
    pub activity_id: i64,
    pub record: TrackPointRecord,
}
