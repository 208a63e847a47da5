//! Plain-text tables and JSON rendering for command output.

use serde::Serialize;

use crate::error::Result;
use crate::loader::{ActivityLoadSummary, LoadSummary, TrackPointLoadSummary, UserLoadSummary};
use crate::reports::ReportOutput;
use crate::store::{ColumnInfo, TableRows};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// A fixed-width text table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: AsRef<str>>(headers: &[S]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Render with every column padded to its widest cell.
    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.chars().count());
                }
            }
        }

        let format_line = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut lines = vec![format_line(&self.headers)];
        lines.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("  "),
        );
        lines.extend(self.rows.iter().map(|row| format_line(row)));
        lines.join("\n")
    }
}

/// Values that can be shown as a [`Table`].
pub trait Tabular {
    fn to_table(&self) -> Table;
}

/// Render `value` as a table or pretty JSON.
pub fn render<T: Tabular + Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(value.to_table().render()),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
    }
}

fn float(value: f64) -> String {
    format!("{:.4}", value)
}

impl Tabular for ReportOutput {
    fn to_table(&self) -> Table {
        match self {
            ReportOutput::Counts(counts) => {
                let mut table = Table::new(&["user_count", "activity_count", "trackpoint_count"]);
                table.push_row(vec![
                    counts.users.to_string(),
                    counts.activities.to_string(),
                    counts.trackpoints.to_string(),
                ]);
                table
            }
            ReportOutput::Average(average) => {
                let mut table = Table::new(&["avg_activities_per_user"]);
                table.push_row(vec![float(*average)]);
                table
            }
            ReportOutput::UserCounts(rows) => {
                let mut table = Table::new(&["user", "activity_count"]);
                for row in rows {
                    table.push_row(vec![row.user_id.clone(), row.activity_count.to_string()]);
                }
                table
            }
            ReportOutput::Users(users) => {
                let mut table = Table::new(&["user"]);
                for user in users {
                    table.push_row(vec![user.clone()]);
                }
                table
            }
            ReportOutput::ModeCounts(rows) => {
                let mut table = Table::new(&["transportation_mode", "activity_count"]);
                for row in rows {
                    table.push_row(vec![
                        row.transportation_mode.clone(),
                        row.activity_count.to_string(),
                    ]);
                }
                table
            }
            ReportOutput::Years(rows) => {
                let mut table = Table::new(&["year", "activity_count", "total_hours"]);
                for row in rows {
                    table.push_row(vec![
                        row.year.to_string(),
                        row.activity_count.to_string(),
                        float(row.total_hours),
                    ]);
                }
                table
            }
            ReportOutput::Distance(distance) => {
                let mut table = Table::new(&["user", "year", "km_walked"]);
                table.push_row(vec![
                    distance.user_id.clone(),
                    distance.year.to_string(),
                    float(distance.km),
                ]);
                table
            }
            ReportOutput::AltitudeGains(rows) => {
                let mut table = Table::new(&["user", "altitude_gained"]);
                for row in rows {
                    table.push_row(vec![row.user_id.clone(), row.altitude_gain.to_string()]);
                }
                table
            }
            ReportOutput::InvalidActivities(rows) => {
                let mut table = Table::new(&["user", "invalid_activity_count"]);
                for row in rows {
                    table.push_row(vec![row.user_id.clone(), row.invalid_activities.to_string()]);
                }
                table
            }
            ReportOutput::UserModes(rows) => {
                let mut table = Table::new(&["user", "most_used_transportation_mode", "count"]);
                for row in rows {
                    table.push_row(vec![
                        row.user_id.clone(),
                        row.transportation_mode.clone(),
                        row.activity_count.to_string(),
                    ]);
                }
                table
            }
        }
    }
}

impl Tabular for TableRows {
    fn to_table(&self) -> Table {
        let mut table = Table::new(&self.columns);
        for row in &self.rows {
            table.push_row(row.clone());
        }
        table
    }
}

impl Tabular for Vec<ColumnInfo> {
    fn to_table(&self) -> Table {
        let mut table = Table::new(&["field", "type", "not_null", "key"]);
        for column in self {
            table.push_row(vec![
                column.name.clone(),
                column.data_type.clone(),
                if column.not_null { "YES" } else { "NO" }.to_string(),
                if column.primary_key { "PRI" } else { "" }.to_string(),
            ]);
        }
        table
    }
}

const PHASE_HEADERS: [&str; 4] = ["phase", "visited", "inserted", "skipped"];

fn users_row(summary: &UserLoadSummary) -> Vec<String> {
    vec![
        "users".to_string(),
        summary.found.to_string(),
        summary.inserted.to_string(),
        summary.found.saturating_sub(summary.inserted).to_string(),
    ]
}

fn activities_row(summary: &ActivityLoadSummary) -> Vec<String> {
    vec![
        "activities".to_string(),
        summary.files.to_string(),
        summary.inserted.to_string(),
        (summary.skipped + summary.empty_files).to_string(),
    ]
}

fn trackpoints_row(summary: &TrackPointLoadSummary) -> Vec<String> {
    vec![
        "trackpoints".to_string(),
        summary.files.to_string(),
        summary.inserted.to_string(),
        (summary.already_loaded + summary.missing_activity).to_string(),
    ]
}

impl Tabular for UserLoadSummary {
    fn to_table(&self) -> Table {
        let mut table = Table::new(&PHASE_HEADERS);
        table.push_row(users_row(self));
        table
    }
}

impl Tabular for ActivityLoadSummary {
    fn to_table(&self) -> Table {
        let mut table = Table::new(&PHASE_HEADERS);
        table.push_row(activities_row(self));
        table
    }
}

impl Tabular for TrackPointLoadSummary {
    fn to_table(&self) -> Table {
        let mut table = Table::new(&PHASE_HEADERS);
        table.push_row(trackpoints_row(self));
        table
    }
}

impl Tabular for LoadSummary {
    fn to_table(&self) -> Table {
        let mut table = Table::new(&PHASE_HEADERS);
        table.push_row(users_row(&self.users));
        table.push_row(activities_row(&self.activities));
        table.push_row(trackpoints_row(&self.trackpoints));
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::TableCounts;

    #[test]
    fn test_table_pads_columns() {
        let mut table = Table::new(&["user", "count"]);
        table.push_row(vec!["000".to_string(), "12345".to_string()]);
        table.push_row(vec!["181".to_string(), "7".to_string()]);

        let text = table.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "user  count");
        assert_eq!(lines[1], "----  -----");
        assert_eq!(lines[2], "000   12345");
        assert_eq!(lines[3], "181   7");
    }

    #[test]
    fn test_json_render() {
        let output = ReportOutput::Counts(TableCounts {
            users: 2,
            activities: 3,
            trackpoints: 4,
        });
        let json = render(&output, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["trackpoints"], 4);
    }
}
