//! End-to-end loading of a small GeoLife-shaped dataset.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use geolife::reports::table_counts;
use geolife::{scan_trajectory_files, GeoLifeStore, IngestConfig, LabelIndex, Loader};
use tempfile::TempDir;

const HEADER: &str = "Geolife trajectory\n\
WGS 84\n\
Altitude is in Feet\n\
Reserved 3\n\
0,2,255,My Track,0,0,2,8421376\n\
0\n";

fn write_plt(root: &Path, user: &str, name: &str, rows: &[String]) {
    let dir = root.join(user).join("Trajectory");
    fs::create_dir_all(&dir).unwrap();
    let mut body = HEADER.to_string();
    for row in rows {
        body.push_str(row);
        body.push('\n');
    }
    fs::write(dir.join(name), body).unwrap();
}

fn rows(count: usize, date: &str, start_minute: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let minute = start_minute + i;
            format!(
                "{:.6},{:.6},0,{},39744.1,{},10:{:02}:00",
                39.9 + i as f64 * 0.001,
                116.3,
                100 + i,
                date,
                minute
            )
        })
        .collect()
}

struct Dataset {
    dir: TempDir,
}

impl Dataset {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("labeled_ids.txt"), "010\n").unwrap();
        fs::create_dir_all(dir.path().join("Data")).unwrap();
        Self { dir }
    }

    fn data_root(&self) -> std::path::PathBuf {
        self.dir.path().join("Data")
    }

    fn config(&self) -> IngestConfig {
        IngestConfig::with_paths(self.data_root(), self.dir.path().join("labeled_ids.txt"))
    }

    fn load(&self, store: &mut GeoLifeStore) -> geolife::LoadSummary {
        let config = self.config();
        let valid = scan_trajectory_files(&config).unwrap();
        let labels = LabelIndex::load(&config.labeled_ids_path).unwrap();
        Loader::new(&config, &valid, &labels).load_all(store).unwrap()
    }
}

#[test]
fn labeled_file_becomes_one_activity_with_all_points() {
    let dataset = Dataset::new();
    let points = rows(12, "2008-06-01", 0);
    write_plt(&dataset.data_root(), "010", "20080601100000.plt", &points);
    fs::write(
        dataset.data_root().join("010").join("labels.txt"),
        "Start Time\tEnd Time\tTransportation Mode\n\
         2008/06/01 10:00:00\t2008/06/01 10:11:00\twalk\n",
    )
    .unwrap();

    let mut store = GeoLifeStore::in_memory().unwrap();
    let summary = dataset.load(&mut store);

    assert_eq!(summary.users.inserted, 1);
    assert_eq!(summary.activities.inserted, 1);
    assert_eq!(summary.activities.labeled, 1);
    assert_eq!(summary.trackpoints.inserted, 12);

    let activities = store.activities_for_user("010").unwrap();
    assert_eq!(activities.len(), 1);
    let activity = &activities[0];
    assert_eq!(activity.transportation_mode.as_deref(), Some("walk"));

    let day = NaiveDate::from_ymd_opt(2008, 6, 1).unwrap();
    assert_eq!(activity.span.start, day.and_hms_opt(10, 0, 0).unwrap());
    assert_eq!(activity.span.end, day.and_hms_opt(10, 11, 0).unwrap());

    let stored = store.track_points(activity.id).unwrap();
    assert_eq!(stored.len(), 12);
    assert_eq!(stored[0].record.altitude, 100);
    assert_eq!(stored[11].record.date_time, activity.span.end);
    assert!((stored[3].record.latitude - 39.903).abs() < 1e-9);
}

#[test]
fn label_off_by_one_second_leaves_mode_empty() {
    let dataset = Dataset::new();
    write_plt(&dataset.data_root(), "010", "a.plt", &rows(3, "2008-06-01", 0));
    fs::write(
        dataset.data_root().join("010").join("labels.txt"),
        "Start Time\tEnd Time\tTransportation Mode\n\
         2008/06/01 10:00:01\t2008/06/01 10:02:00\tbus\n",
    )
    .unwrap();

    let mut store = GeoLifeStore::in_memory().unwrap();
    dataset.load(&mut store);

    let activities = store.activities_for_user("010").unwrap();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].transportation_mode, None);
}

#[test]
fn only_valid_files_are_loaded() {
    let dataset = Dataset::new();
    write_plt(&dataset.data_root(), "000", "header_only.plt", &[]);
    write_plt(&dataset.data_root(), "000", "one_row.plt", &rows(1, "2009-01-02", 0));
    write_plt(&dataset.data_root(), "000", "too_long.plt", &rows(2501, "2009-01-03", 0));

    let config = dataset.config();
    let valid = scan_trajectory_files(&config).unwrap();
    assert_eq!(valid.len(), 3);
    assert_eq!(valid.valid_count(), 1);

    let mut store = GeoLifeStore::in_memory().unwrap();
    let summary = dataset.load(&mut store);
    assert_eq!(summary.activities.files, 1);

    let counts = table_counts(store.connection()).unwrap();
    assert_eq!(counts.users, 1);
    assert_eq!(counts.activities, 1);
    assert_eq!(counts.trackpoints, 1);
}

#[test]
fn every_activity_owns_its_file_rows() {
    let dataset = Dataset::new();
    write_plt(&dataset.data_root(), "000", "a.plt", &rows(4, "2008-10-23", 0));
    write_plt(&dataset.data_root(), "000", "b.plt", &rows(7, "2008-10-24", 10));
    write_plt(&dataset.data_root(), "001", "c.plt", &rows(2, "2008-10-25", 30));

    let mut store = GeoLifeStore::in_memory().unwrap();
    dataset.load(&mut store);

    let mut sizes = Vec::new();
    for user in store.users().unwrap() {
        for activity in store.activities_for_user(&user.id).unwrap() {
            let points = store.track_points(activity.id).unwrap();
            assert_eq!(points.first().unwrap().record.date_time, activity.span.start);
            assert_eq!(points.last().unwrap().record.date_time, activity.span.end);
            sizes.push(points.len());
        }
    }
    assert_eq!(sizes, vec![4, 7, 2]);
}

#[test]
fn rerun_on_file_store_adds_nothing() {
    let dataset = Dataset::new();
    write_plt(&dataset.data_root(), "000", "a.plt", &rows(5, "2008-10-23", 0));
    write_plt(&dataset.data_root(), "010", "b.plt", &rows(3, "2008-11-02", 0));

    let db_path = dataset.dir.path().join("geolife.db");
    {
        let mut store = GeoLifeStore::new(&db_path).unwrap();
        dataset.load(&mut store);
    }

    let mut store = GeoLifeStore::new(&db_path).unwrap();
    let second = dataset.load(&mut store);
    assert_eq!(second.users.inserted, 0);
    assert_eq!(second.activities.inserted, 0);
    assert_eq!(second.trackpoints.inserted, 0);
    assert_eq!(second.trackpoints.already_loaded, 2);

    let counts = table_counts(store.connection()).unwrap();
    assert_eq!(counts.users, 2);
    assert_eq!(counts.activities, 2);
    assert_eq!(counts.trackpoints, 8);
}

#[test]
fn users_flagged_from_labeled_ids() {
    let dataset = Dataset::new();
    write_plt(&dataset.data_root(), "000", "a.plt", &rows(2, "2008-10-23", 0));
    write_plt(&dataset.data_root(), "010", "b.plt", &rows(2, "2008-10-23", 0));

    let mut store = GeoLifeStore::in_memory().unwrap();
    dataset.load(&mut store);

    let flags: Vec<(String, bool)> = store
        .users()
        .unwrap()
        .into_iter()
        .map(|u| (u.id, u.has_labels))
        .collect();
    assert_eq!(
        flags,
        vec![("000".to_string(), false), ("010".to_string(), true)]
    );
}
