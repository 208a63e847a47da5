//! # Loader
//!
//! Bulk loads the dataset in three phases:
//!
//! 0. **Users** - one row per user directory
//! 1. **Activities** - one row per valid trajectory file, mode resolved
//!    from labels, inserted in batches and committed once
//! 2. **TrackPoints** - every row of every valid file, tagged with the
//!    Activity found again by (user, start, end)
//!
//! Phase 2 re-derives Activity identity from the store instead of keeping
//! ids from Phase 1, so each phase can run on its own. Both phases skip work
//! already present in the store, which makes re-runs safe.

use std::collections::HashSet;
use std::fs;

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::labels::LabelIndex;
use crate::matcher::LabelMatcher;
use crate::store::GeoLifeStore;
use crate::trajectory::{is_valid_user_id, read_time_span, read_track_points, user_id_from_path};
use crate::validator::ValidityMap;
use crate::{NewActivity, TrackPointRecord, User};

/// Outcome of the Users phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserLoadSummary {
    pub found: usize,
    pub inserted: usize,
}

/// Outcome of the Activities phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivityLoadSummary {
    /// Valid files visited
    pub files: usize,
    /// Files without any parseable data row
    pub empty_files: usize,
    /// Activities with a matched transportation mode
    pub labeled: usize,
    pub inserted: usize,
    /// Activities whose (user, start, end) was already stored
    pub skipped: usize,
}

/// Outcome of the TrackPoints phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackPointLoadSummary {
    /// Valid files visited
    pub files: usize,
    /// Activities that received points in this run
    pub activities: usize,
    /// Activities that already owned points
    pub already_loaded: usize,
    /// Files with no matching Activity in the store
    pub missing_activity: usize,
    pub inserted: usize,
}

/// Outcome of a full load.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadSummary {
    pub users: UserLoadSummary,
    pub activities: ActivityLoadSummary,
    pub trackpoints: TrackPointLoadSummary,
}

/// Runs the load phases over an already scanned dataset.
///
/// The validity map and label index are computed once by the caller and
/// passed in as immutable values.
pub struct Loader<'a> {
    config: &'a IngestConfig,
    valid_files: &'a ValidityMap,
    labels: &'a LabelIndex,
}

impl<'a> Loader<'a> {
    pub fn new(config: &'a IngestConfig, valid_files: &'a ValidityMap, labels: &'a LabelIndex) -> Self {
        Self {
            config,
            valid_files,
            labels,
        }
    }

    /// Run all phases in order.
    pub fn load_all(&self, store: &mut GeoLifeStore) -> Result<LoadSummary> {
        self.config.validate()?;
        Ok(LoadSummary {
            users: self.load_users(store)?,
            activities: self.load_activities(store)?,
            trackpoints: self.load_trackpoints(store)?,
        })
    }

    // ========================================================================
    // Phase 0: Users
    // ========================================================================

    /// User directories directly under the data root, sorted by id.
    ///
    /// Directories whose name is not a user id are ignored.
    pub fn discover_users(&self) -> Result<Vec<User>> {
        let root = self.valid_files.root();
        let scan_error = |source: std::io::Error| IngestError::FileScan {
            path: root.to_path_buf(),
            source,
        };

        let mut users = Vec::new();
        for entry in fs::read_dir(root).map_err(scan_error)? {
            let entry = entry.map_err(scan_error)?;
            if !entry.file_type().map_err(scan_error)?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_valid_user_id(&name) {
                warn!("[Loader] Ignoring non-user directory {}", entry.path().display());
                continue;
            }
            let has_labels = self.labels.user_has_labels(&name);
            users.push(User {
                id: name,
                has_labels,
            });
        }
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    pub fn load_users(&self, store: &mut GeoLifeStore) -> Result<UserLoadSummary> {
        let users = self.discover_users()?;
        let inserted = store.insert_users(&users)?;
        let summary = UserLoadSummary {
            found: users.len(),
            inserted,
        };
        info!(
            "[Loader] Users: {} found, {} inserted",
            summary.found, summary.inserted
        );
        Ok(summary)
    }

    // ========================================================================
    // Phase 1: Activities
    // ========================================================================

    /// Parse one Activity per valid file. Returns the activities and a
    /// summary with the file counters filled in.
    pub fn collect_activities(&self) -> Result<(Vec<NewActivity>, ActivityLoadSummary)> {
        let root = self.valid_files.root();
        let mut matcher = LabelMatcher::new(root);
        let mut summary = ActivityLoadSummary::default();
        let mut activities = Vec::new();
        let total = self.valid_files.valid_count();

        for path in self.valid_files.valid_files() {
            summary.files += 1;
            debug!("[Loader] {}/{} {}", summary.files, total, path.display());

            let user_id = user_id_from_path(root, path)?;
            let Some(span) = read_time_span(path, self.config.header_lines)? else {
                warn!("[Loader] No data rows in {}, skipping", path.display());
                summary.empty_files += 1;
                continue;
            };

            let transportation_mode = if self.labels.user_has_labels(&user_id) {
                matcher.mode_for(&user_id, &span)?
            } else {
                None
            };
            if transportation_mode.is_some() {
                summary.labeled += 1;
            }

            activities.push(NewActivity {
                user_id,
                transportation_mode,
                span,
            });
        }
        Ok((activities, summary))
    }

    pub fn load_activities(&self, store: &mut GeoLifeStore) -> Result<ActivityLoadSummary> {
        let (activities, mut summary) = self.collect_activities()?;
        info!(
            "[Loader] Parsed {} activities ({} labeled) from {} files",
            activities.len(),
            summary.labeled,
            summary.files
        );

        summary.inserted = store.insert_activities(&activities, self.config.activity_batch_size)?;
        summary.skipped = activities.len() - summary.inserted;
        info!(
            "[Loader] Activities: {} inserted, {} already stored",
            summary.inserted, summary.skipped
        );
        Ok(summary)
    }

    // ========================================================================
    // Phase 2: TrackPoints
    // ========================================================================

    pub fn load_trackpoints(&self, store: &mut GeoLifeStore) -> Result<TrackPointLoadSummary> {
        let root = self.valid_files.root();
        let mut summary = TrackPointLoadSummary::default();
        let mut pending: Vec<(i64, TrackPointRecord)> = Vec::new();
        let mut claimed: HashSet<i64> = HashSet::new();
        let total = self.valid_files.valid_count();

        for path in self.valid_files.valid_files() {
            summary.files += 1;
            debug!("[Loader] {}/{} {}", summary.files, total, path.display());

            let user_id = user_id_from_path(root, path)?;
            let Some(span) = read_time_span(path, self.config.header_lines)? else {
                continue;
            };

            let Some(activity_id) = store.find_activity_id(&user_id, &span)? else {
                warn!(
                    "[Loader] No activity for user {} {} - {}, skipping {}",
                    user_id,
                    span.start,
                    span.end,
                    path.display()
                );
                summary.missing_activity += 1;
                continue;
            };

            if !claimed.insert(activity_id) || store.has_trackpoints(activity_id)? {
                summary.already_loaded += 1;
                continue;
            }

            let points = read_track_points(path, self.config.header_lines)?;
            pending.extend(points.into_iter().map(|point| (activity_id, point)));
            summary.activities += 1;
        }

        info!(
            "[Loader] Parsed {} trackpoints for {} activities",
            pending.len(),
            summary.activities
        );
        summary.inserted = store.insert_trackpoints(&pending, self.config.trackpoint_batch_size)?;
        info!(
            "[Loader] TrackPoints: {} inserted, {} activities already loaded",
            summary.inserted, summary.already_loaded
        );
        Ok(summary)
    }
}
