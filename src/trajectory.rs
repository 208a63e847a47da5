//! # Trajectory Parser
//!
//! Reads GeoLife `.plt` files. After a fixed header every row is
//! `lat,lon,0,altitude,days,date,time`. Rows with fewer than 7 fields are
//! skipped; a malformed timestamp or number on a full row aborts the file
//! in both readers.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Component, Path};

use chrono::NaiveDateTime;
use log::debug;

use crate::error::{IngestError, Result};
use crate::{TimeSpan, TrackPointRecord, DATETIME_FORMAT};

/// Minimum comma-separated fields of a data row.
pub const MIN_ROW_FIELDS: usize = 7;

/// Width of a GeoLife user directory name ("000" .. "181").
pub const USER_ID_WIDTH: usize = 3;

const LAT_FIELD: usize = 0;
const LON_FIELD: usize = 1;
const ALTITUDE_FIELD: usize = 3;
const DATE_FIELD: usize = 5;
const TIME_FIELD: usize = 6;

/// Parse a `YYYY-MM-DD` date and `HH:MM:SS` time into one timestamp.
pub fn parse_timestamp(date: &str, time: &str) -> std::result::Result<NaiveDateTime, String> {
    let combined = format!("{} {}", date.trim(), time.trim());
    NaiveDateTime::parse_from_str(&combined, DATETIME_FORMAT)
        .map_err(|e| format!("invalid timestamp '{}': {}", combined, e))
}

/// First and last timestamp among the data rows of a file.
///
/// Every row is parsed in full, so a file accepted here also loads its
/// TrackPoints. A last row older than the first fails with a parse error.
/// Returns `None` when the file has no structurally valid data row.
pub fn read_time_span(path: &Path, header_lines: usize) -> Result<Option<TimeSpan>> {
    let mut first: Option<NaiveDateTime> = None;
    let mut last: Option<(usize, NaiveDateTime)> = None;

    for_each_row(path, header_lines, |line_number, fields| {
        let point = parse_row(&fields)
            .map_err(|message| IngestError::parse(path, line_number, message))?;
        first.get_or_insert(point.date_time);
        last = Some((line_number, point.date_time));
        Ok(())
    })?;

    let (Some(start), Some((last_line, end))) = (first, last) else {
        return Ok(None);
    };
    let span = TimeSpan { start, end };
    if span.duration_secs() < 0 {
        return Err(IngestError::parse(
            path,
            last_line,
            format!("last row at {} precedes first row at {}", end, start),
        ));
    }
    Ok(Some(span))
}

/// Every structurally valid data row of a file, in file order.
pub fn read_track_points(path: &Path, header_lines: usize) -> Result<Vec<TrackPointRecord>> {
    let mut points = Vec::new();
    for_each_row(path, header_lines, |line_number, fields| {
        let point = parse_row(&fields)
            .map_err(|message| IngestError::parse(path, line_number, message))?;
        points.push(point);
        Ok(())
    })?;
    Ok(points)
}

/// Parse one split data row into a TrackPoint record.
fn parse_row(fields: &[&str]) -> std::result::Result<TrackPointRecord, String> {
    let latitude = parse_number(fields[LAT_FIELD], "latitude")?;
    let longitude = parse_number(fields[LON_FIELD], "longitude")?;
    let altitude = parse_number(fields[ALTITUDE_FIELD], "altitude")?;
    let date_time = parse_timestamp(fields[DATE_FIELD], fields[TIME_FIELD])?;

    let altitude = i32::try_from(altitude.round() as i64)
        .map_err(|_| format!("altitude '{}' out of range", fields[ALTITUDE_FIELD]))?;

    Ok(TrackPointRecord {
        latitude,
        longitude,
        altitude,
        date_time,
    })
}

fn parse_number(field: &str, name: &str) -> std::result::Result<f64, String> {
    field
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("invalid {} '{}'", name, field))
}

/// Call `f` with the 1-based line number and fields of each data row.
fn for_each_row<F>(path: &Path, header_lines: usize, mut f: F) -> Result<()>
where
    F: FnMut(usize, Vec<&str>) -> Result<()>,
{
    let file = File::open(path).map_err(|source| IngestError::FileScan {
        path: path.to_path_buf(),
        source,
    })?;

    for (index, line) in BufReader::new(file).lines().enumerate().skip(header_lines) {
        let line = line.map_err(|source| IngestError::FileScan {
            path: path.to_path_buf(),
            source,
        })?;
        let fields: Vec<&str> = line.trim().split(',').collect();
        if fields.len() < MIN_ROW_FIELDS {
            debug!(
                "[Parser] Skipping malformed row {} in {} ({} fields)",
                index + 1,
                path.display(),
                fields.len()
            );
            continue;
        }
        f(index + 1, fields)?;
    }
    Ok(())
}

/// Whether `id` has the shape of a GeoLife user directory name.
pub fn is_valid_user_id(id: &str) -> bool {
    id.len() == USER_ID_WIDTH && id.bytes().all(|b| b.is_ascii_digit())
}

/// Extract the user id from a trajectory path under `root`.
///
/// The user is the first directory below the root
/// (`<root>/<user>/Trajectory/<file>.plt`).
pub fn user_id_from_path(root: &Path, path: &Path) -> Result<String> {
    let invalid = |message: &str| IngestError::InvalidUserId {
        path: path.to_path_buf(),
        message: message.to_string(),
    };

    let relative = path
        .strip_prefix(root)
        .map_err(|_| invalid("path is outside the data root"))?;

    let mut components = relative.components();
    let user = match components.next() {
        Some(Component::Normal(name)) => name.to_str().ok_or_else(|| invalid("non UTF-8 name"))?,
        _ => return Err(invalid("missing user directory")),
    };
    if components.next().is_none() {
        return Err(invalid("file sits directly in the data root"));
    }
    if !is_valid_user_id(user) {
        return Err(invalid(&format!(
            "'{}' is not a {}-digit user id",
            user, USER_ID_WIDTH
        )));
    }
    Ok(user.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const HEADER: &str = "Geolife trajectory\nWGS 84\nAltitude is in Feet\nReserved 3\n0,2,255,My Track,0,0,2,8421376\n0\n";

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2008, 10, 23)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn write_plt(dir: &TempDir, rows: &str) -> PathBuf {
        let path = dir.path().join("track.plt");
        fs::write(&path, format!("{}{}", HEADER, rows)).unwrap();
        path
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("2008-10-23", "02:53:04").unwrap(), ts(2, 53, 4));
        assert!(parse_timestamp("2008/10/23", "02:53:04").is_err());
        assert!(parse_timestamp("2008-10-23", "2:53").is_err());
    }

    #[test]
    fn test_time_span_first_and_last() {
        let dir = TempDir::new().unwrap();
        let path = write_plt(
            &dir,
            "39.984702,116.318417,0,492,39744.1201851852,2008-10-23,02:53:04\n\
             39.984683,116.31845,0,492,39744.1202546296,2008-10-23,02:53:10\n\
             39.984686,116.318417,0,492,39744.1203125,2008-10-23,02:53:15\n",
        );

        let span = read_time_span(&path, 6).unwrap().unwrap();
        assert_eq!(span.start, ts(2, 53, 4));
        assert_eq!(span.end, ts(2, 53, 15));
    }

    #[test]
    fn test_header_only_file_has_no_span() {
        let dir = TempDir::new().unwrap();
        let path = write_plt(&dir, "");
        assert!(read_time_span(&path, 6).unwrap().is_none());
        assert!(read_track_points(&path, 6).unwrap().is_empty());
    }

    #[test]
    fn test_short_rows_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = write_plt(
            &dir,
            "39.9,116.3,0,100,39744.1,2008-10-23,02:53:04\n\
             garbage,row\n\
             \n\
             39.8,116.2,0,-777,39744.2,2008-10-23,02:54:00\n",
        );

        let points = read_track_points(&path, 6).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].altitude, 100);
        assert_eq!(points[1].altitude, crate::ALTITUDE_UNKNOWN);
        assert_eq!(points[1].date_time, ts(2, 54, 0));
    }

    #[test]
    fn test_bad_timestamp_aborts_file() {
        let dir = TempDir::new().unwrap();
        let path = write_plt(
            &dir,
            "39.9,116.3,0,100,39744.1,2008-10-23,02:53:04\n\
             39.9,116.3,0,100,39744.1,23/10/2008,02:53:05\n",
        );

        let err = read_time_span(&path, 6).unwrap_err();
        match err {
            IngestError::Parse { line, .. } => assert_eq!(line, 8),
            other => panic!("unexpected error: {other}"),
        }
        assert!(read_track_points(&path, 6).is_err());
    }

    #[test]
    fn test_fractional_altitude_is_rounded() {
        let dir = TempDir::new().unwrap();
        let path = write_plt(&dir, "39.9,116.3,0,130.6,39744.1,2008-10-23,02:53:04\r\n");
        let points = read_track_points(&path, 6).unwrap();
        assert_eq!(points[0].altitude, 131);
    }

    #[test]
    fn test_bad_latitude_fails_time_span_too() {
        let dir = TempDir::new().unwrap();
        let path = write_plt(
            &dir,
            "39.9,116.3,0,100,39744.1,2008-10-23,02:00:00\n\
             abc,116.3,0,10,1,2008-10-23,02:01:00\n",
        );

        for err in [
            read_time_span(&path, 6).unwrap_err(),
            read_track_points(&path, 6).unwrap_err(),
        ] {
            match err {
                IngestError::Parse { line, message, .. } => {
                    assert_eq!(line, 8);
                    assert!(message.contains("latitude"), "{message}");
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_out_of_order_span_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_plt(
            &dir,
            "39.9,116.3,0,100,39744.1,2008-10-23,03:00:00\n\
             39.9,116.3,0,100,39744.1,2008-10-23,02:00:00\n",
        );

        match read_time_span(&path, 6).unwrap_err() {
            IngestError::Parse { line, .. } => assert_eq!(line, 8),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_single_row_span_is_instant() {
        let dir = TempDir::new().unwrap();
        let path = write_plt(&dir, "39.9,116.3,0,100,39744.1,2008-10-23,02:00:00\n");
        let span = read_time_span(&path, 6).unwrap().unwrap();
        assert_eq!(span.start, span.end);
        assert_eq!(span.duration_secs(), 0);
    }

    #[test]
    fn test_altitude_out_of_range_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_plt(&dir, "39.9,116.3,0,1e20,39744.1,2008-10-23,02:53:04\n");
        match read_track_points(&path, 6).unwrap_err() {
            IngestError::Parse { line, message, .. } => {
                assert_eq!(line, 7);
                assert!(message.contains("out of range"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(read_time_span(&path, 6).is_err());
    }

    #[test]
    fn test_user_id_from_path() {
        let root = Path::new("/data/Data");
        let path = root.join("112").join("Trajectory").join("20080101.plt");
        assert_eq!(user_id_from_path(root, &path).unwrap(), "112");
    }

    #[test]
    fn test_user_id_rejects_bad_layout() {
        let root = Path::new("/data/Data");
        let bad_name = root.join("user1").join("Trajectory").join("a.plt");
        let outside = Path::new("/elsewhere/112/Trajectory/a.plt");
        let top_level = root.join("a.plt");

        for path in [bad_name.as_path(), outside, top_level.as_path()] {
            assert!(matches!(
                user_id_from_path(root, path),
                Err(IngestError::InvalidUserId { .. })
            ));
        }
    }
}
