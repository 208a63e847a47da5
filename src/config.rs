//! Ingestion and reporting configuration.

use std::path::PathBuf;

use crate::error::{IngestError, Result};

/// Configuration for scanning and loading the dataset.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Directory holding one subdirectory per user.
    /// Default: `dataset/Data`
    pub data_root: PathBuf,

    /// Newline-separated list of users with transportation-mode labels.
    /// Default: `dataset/labeled_ids.txt`
    pub labeled_ids_path: PathBuf,

    /// Fixed-format header lines at the top of every `.plt` file.
    /// Default: 6
    pub header_lines: usize,

    /// Files with more lines than this are excluded from ingestion.
    /// Default: 2506
    pub max_file_lines: usize,

    /// Activities per insert batch.
    /// Default: 1000
    pub activity_batch_size: usize,

    /// TrackPoints per insert batch.
    /// Default: 10000
    pub trackpoint_batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("dataset/Data"),
            labeled_ids_path: PathBuf::from("dataset/labeled_ids.txt"),
            header_lines: 6,
            max_file_lines: 2506,
            activity_batch_size: 1000,
            trackpoint_batch_size: 10_000,
        }
    }
}

impl IngestConfig {
    /// Create a configuration for a dataset rooted at `data_root`.
    pub fn with_paths(data_root: impl Into<PathBuf>, labeled_ids_path: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            labeled_ids_path: labeled_ids_path.into(),
            ..Self::default()
        }
    }

    /// Reject settings the loader cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.activity_batch_size == 0 || self.trackpoint_batch_size == 0 {
            return Err(IngestError::config("batch sizes must be positive"));
        }
        if self.max_file_lines <= self.header_lines {
            return Err(IngestError::config(format!(
                "max_file_lines ({}) must exceed header_lines ({})",
                self.max_file_lines, self.header_lines
            )));
        }
        Ok(())
    }
}

/// Parameters for the reporting catalogue.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Rows returned by ranking reports.
    /// Default: 20
    pub top_n: u32,

    /// User whose walked distance is accumulated.
    /// Default: "112"
    pub walk_user: String,

    /// Year whose walked distance is accumulated.
    /// Default: 2008
    pub walk_year: i32,

    /// Adjacent TrackPoints further apart than this mark an Activity invalid.
    /// Default: 5
    pub max_gap_minutes: i64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: 20,
            walk_user: "112".to_string(),
            walk_year: 2008,
            max_gap_minutes: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = IngestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_file_lines, 2506);
        assert_eq!(config.header_lines, 6);
    }

    #[test]
    fn test_zero_batch_rejected() {
        let config = IngestConfig {
            trackpoint_batch_size: 0,
            ..IngestConfig::default()
        };
        assert!(matches!(config.validate(), Err(IngestError::Config { .. })));
    }

    #[test]
    fn test_line_bounds_rejected() {
        let config = IngestConfig {
            max_file_lines: 6,
            ..IngestConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
