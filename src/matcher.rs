//! # Label Matcher
//!
//! Finds the transportation mode of an Activity by looking for a row in the
//! user's `labels.txt` whose start and end equal the Activity's span to the
//! second. There is no tolerance window.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::debug;

use crate::error::{IngestError, Result};
use crate::TimeSpan;

/// Label file name inside a user directory.
pub const LABEL_FILE_NAME: &str = "labels.txt";

/// Timestamp format of label rows (differs from `.plt` rows).
pub const LABEL_DATETIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// One ground-truth annotation: a time range and its transportation mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub span: TimeSpan,
    pub mode: String,
}

/// Read a tab-separated label file (one header line, then
/// `start\tend\tmode` rows). A missing file yields no labels.
pub fn read_label_file(path: &Path) -> Result<Vec<Label>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(IngestError::FileScan {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut labels = Vec::new();
    for (index, line) in content.lines().enumerate().skip(1) {
        let columns: Vec<&str> = line.trim().split('\t').collect();
        if columns.len() < 3 {
            debug!("[Matcher] Skipping short label row {} in {}", index + 1, path.display());
            continue;
        }
        let parse = |value: &str| {
            NaiveDateTime::parse_from_str(value.trim(), LABEL_DATETIME_FORMAT).map_err(|e| {
                IngestError::parse(path, index + 1, format!("invalid label time '{}': {}", value, e))
            })
        };
        labels.push(Label {
            span: TimeSpan {
                start: parse(columns[0])?,
                end: parse(columns[1])?,
            },
            mode: columns[2].trim().to_string(),
        });
    }
    Ok(labels)
}

/// Mode of the first label whose span equals `span` exactly.
pub fn find_matching_mode<'a>(labels: &'a [Label], span: &TimeSpan) -> Option<&'a str> {
    labels
        .iter()
        .find(|label| label.span == *span)
        .map(|label| label.mode.as_str())
}

/// Per-run matcher that parses each user's label file once.
#[derive(Debug)]
pub struct LabelMatcher {
    data_root: PathBuf,
    cache: HashMap<String, Vec<Label>>,
}

impl LabelMatcher {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            cache: HashMap::new(),
        }
    }

    /// Path of a user's label file.
    pub fn label_path(&self, user_id: &str) -> PathBuf {
        self.data_root.join(user_id).join(LABEL_FILE_NAME)
    }

    /// Transportation mode for `user_id` over `span`, if a label matches.
    pub fn mode_for(&mut self, user_id: &str, span: &TimeSpan) -> Result<Option<String>> {
        if !self.cache.contains_key(user_id) {
            let labels = read_label_file(&self.label_path(user_id))?;
            debug!("[Matcher] Loaded {} labels for user {}", labels.len(), user_id);
            self.cache.insert(user_id.to_string(), labels);
        }
        Ok(self
            .cache
            .get(user_id)
            .and_then(|labels| find_matching_mode(labels, span))
            .map(str::to_string))
    }
}
