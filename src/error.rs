//! Unified error handling for the GeoLife ingestion pipeline.
//!
//! Every stage (scan, parse, load, report) returns [`IngestError`] so the
//! binary can report one diagnostic line and stop.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for ingestion and reporting.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A directory or file under the data root could not be read
    #[error("cannot scan {}: {source}", .path.display())]
    FileScan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A timestamp or field did not have the expected shape
    #[error("parse error in {} line {line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// A trajectory path does not sit under a valid user directory
    #[error("invalid user directory for {}: {message}", .path.display())]
    InvalidUserId { path: PathBuf, message: String },

    /// Failure talking to the SQLite store
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration or command-line parameter
    #[error("configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

impl IngestError {
    /// Create a parse error for a line of a file.
    pub fn parse(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Create a configuration error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = IngestError::parse("/data/000/Trajectory/a.plt", 7, "bad timestamp");
        let text = err.to_string();
        assert!(text.contains("a.plt"));
        assert!(text.contains("line 7"));
        assert!(text.contains("bad timestamp"));
    }

    #[test]
    fn test_file_scan_error_keeps_source() {
        let err = IngestError::FileScan {
            path: PathBuf::from("/missing"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().starts_with("cannot scan /missing"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_store_error_from_rusqlite() {
        let err: IngestError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, IngestError::Store(_)));
    }

    #[test]
    fn test_config_constructor() {
        let err = IngestError::config("batch size must be positive");
        assert!(matches!(err, IngestError::Config { .. }));
        assert!(err.to_string().contains("batch size"));
    }
}
