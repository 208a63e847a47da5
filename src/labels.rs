//! Label Index: the set of users that ship transportation-mode labels.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::info;

use crate::error::{IngestError, Result};

/// Users listed in `labeled_ids.txt`. Loaded once, immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    users: HashSet<String>,
}

impl LabelIndex {
    /// Read one user id per line, trimming whitespace and skipping blanks.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| IngestError::FileScan {
            path: path.to_path_buf(),
            source,
        })?;
        let index = Self::from_ids(content.lines());
        info!(
            "[Labels] Loaded {} labeled users from {}",
            index.len(),
            path.display()
        );
        Ok(index)
    }

    /// Build an index from an iterator of ids.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let users = ids
            .into_iter()
            .map(|id| id.as_ref().trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        Self { users }
    }

    pub fn user_has_labels(&self, user_id: &str) -> bool {
        self.users.contains(user_id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
