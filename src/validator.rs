//! # File Validator
//!
//! Walks the dataset tree and classifies every `.plt` trajectory file as
//! usable or not by its line count. The resulting [`ValidityMap`] is built
//! once and handed to the loader as an immutable value.
//!
//! A file is valid when `header_lines < line_count <= max_file_lines`:
//! header-only files carry no data rows, oversized ones are excluded.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::{debug, info};
use walkdir::WalkDir;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};

/// Extension of GeoLife trajectory files.
pub const TRAJECTORY_EXTENSION: &str = "plt";

/// Validity flag for every trajectory file found under a data root.
#[derive(Debug, Clone, Default)]
pub struct ValidityMap {
    root: PathBuf,
    files: BTreeMap<PathBuf, bool>,
}

impl ValidityMap {
    /// Canonical data root the paths were collected from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` was scanned and found valid. Unknown paths are invalid.
    pub fn is_valid(&self, path: &Path) -> bool {
        self.files.get(path).copied().unwrap_or(false)
    }

    /// Valid files in path order.
    pub fn valid_files(&self) -> impl Iterator<Item = &Path> {
        self.files
            .iter()
            .filter(|(_, valid)| **valid)
            .map(|(path, _)| path.as_path())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn valid_count(&self) -> usize {
        self.files.values().filter(|valid| **valid).count()
    }

    pub fn invalid_count(&self) -> usize {
        self.len() - self.valid_count()
    }
}

/// Classify a file from its number of lines.
pub fn is_valid_line_count(line_count: usize, config: &IngestConfig) -> bool {
    line_count > config.header_lines && line_count <= config.max_file_lines
}

/// Scan `config.data_root` recursively and classify every `.plt` file.
///
/// Any unreadable directory or file fails the whole scan.
pub fn scan_trajectory_files(config: &IngestConfig) -> Result<ValidityMap> {
    let root = config
        .data_root
        .canonicalize()
        .map_err(|source| IngestError::FileScan {
            path: config.data_root.clone(),
            source,
        })?;

    let mut paths = Vec::new();
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
            IngestError::FileScan {
                path,
                source: err.into(),
            }
        })?;

        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().is_some_and(|ext| ext == TRAJECTORY_EXTENSION)
        {
            paths.push(path.to_path_buf());
        }
    }

    #[cfg(feature = "parallel")]
    let classified: Vec<(PathBuf, bool)> = paths
        .into_par_iter()
        .map(|path| classify(path, config))
        .collect::<Result<_>>()?;
    #[cfg(not(feature = "parallel"))]
    let classified: Vec<(PathBuf, bool)> = paths
        .into_iter()
        .map(|path| classify(path, config))
        .collect::<Result<_>>()?;

    let files: BTreeMap<PathBuf, bool> = classified.into_iter().collect();

    let map = ValidityMap { root, files };
    info!(
        "[Validator] Scanned {} trajectory files: {} valid, {} invalid",
        map.len(),
        map.valid_count(),
        map.invalid_count()
    );
    Ok(map)
}

fn classify(path: PathBuf, config: &IngestConfig) -> Result<(PathBuf, bool)> {
    let line_count = match count_lines(&path, config.max_file_lines) {
        Ok(count) => count,
        Err(source) => return Err(IngestError::FileScan { path, source }),
    };
    let valid = is_valid_line_count(line_count, config);
    debug!(
        "[Validator] {} has {} lines, valid={}",
        path.display(),
        line_count,
        valid
    );
    Ok((path, valid))
}

/// Count lines, stopping once the count exceeds `limit`.
fn count_lines(path: &Path, limit: usize) -> std::io::Result<usize> {
    let reader = BufReader::new(File::open(path)?);
    let mut count = 0;
    for line in reader.split(b'\n') {
        line?;
        count += 1;
        if count > limit {
            break;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_lines(path: &Path, count: usize) {
        let body: String = (0..count).map(|i| format!("line {}\n", i)).collect();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn config_for(dir: &TempDir) -> IngestConfig {
        IngestConfig::with_paths(dir.path(), dir.path().join("labeled_ids.txt"))
    }

    #[test]
    fn test_line_count_boundaries() {
        let config = IngestConfig::default();
        assert!(!is_valid_line_count(0, &config));
        assert!(!is_valid_line_count(6, &config));
        assert!(is_valid_line_count(7, &config));
        assert!(is_valid_line_count(2506, &config));
        assert!(!is_valid_line_count(2507, &config));
    }

    #[test]
    fn test_scan_classifies_files() {
        let dir = TempDir::new().unwrap();
        let traj = dir.path().join("000").join("Trajectory");
        write_lines(&traj.join("header_only.plt"), 6);
        write_lines(&traj.join("ok.plt"), 7);
        write_lines(&traj.join("max.plt"), 2506);
        write_lines(&traj.join("too_big.plt"), 2507);
        write_lines(&traj.join("notes.txt"), 50);

        let map = scan_trajectory_files(&config_for(&dir)).unwrap();
        let root = dir.path().canonicalize().unwrap();
        let traj = root.join("000").join("Trajectory");

        assert_eq!(map.len(), 4);
        assert!(!map.is_valid(&traj.join("header_only.plt")));
        assert!(map.is_valid(&traj.join("ok.plt")));
        assert!(map.is_valid(&traj.join("max.plt")));
        assert!(!map.is_valid(&traj.join("too_big.plt")));
        assert!(!map.is_valid(&traj.join("notes.txt")));
        assert_eq!(map.valid_count(), 2);
        assert_eq!(map.invalid_count(), 2);
    }

    #[test]
    fn test_last_line_without_newline_counts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("001").join("Trajectory").join("t.plt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut body: String = (0..6).map(|i| format!("h{}\n", i)).collect();
        body.push_str("39.9,116.3,0,100,39745.1,2008-10-24,02:09:59");
        fs::write(&path, body).unwrap();

        let map = scan_trajectory_files(&config_for(&dir)).unwrap();
        assert_eq!(map.valid_count(), 1);
    }

    #[test]
    fn test_missing_root_fails_scan() {
        let dir = TempDir::new().unwrap();
        let config = IngestConfig::with_paths(dir.path().join("nope"), "labeled_ids.txt");
        let err = scan_trajectory_files(&config).unwrap_err();
        assert!(matches!(err, IngestError::FileScan { .. }));
    }
}
