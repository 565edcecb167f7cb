//! Session-to-attendance aggregation.
//!
//! Reconciles every session file for a subject into one consolidated table:
//! a full outer union of rows keyed by (enrollment, name), one column per
//! distinct session date in chronological order, and a derived percentage.
//! The table is a pure function of the session files: it is recomputed
//! wholesale on every request and never patched incrementally.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::layout::Layout;
use crate::session::{self, LoadedSession};

pub const CONSOLIDATED_FILE: &str = "attendance.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRow {
    pub enrollment: String,
    pub name: String,
    /// Presence bits aligned with the table's `date_columns`.
    pub presence: Vec<u8>,
    /// `round(mean(presence) * 100)`.
    pub percent: u32,
}

impl AttendanceRow {
    /// Contract formatting: integer plus a percent marker.
    pub fn percent_display(&self) -> String {
        format!("{}%", self.percent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceTable {
    pub subject: String,
    /// Distinct session dates, chronological (ISO dates sort correctly).
    pub date_columns: Vec<String>,
    /// Rows in lexicographic (enrollment, name) order.
    pub rows: Vec<AttendanceRow>,
}

/// Aggregate all session files for `subject` under `dir`.
///
/// Malformed files are skipped with a warning; if nothing usable remains,
/// the whole aggregation fails with [`StoreError::NoSessions`] rather than
/// emitting an empty table.
pub fn aggregate(dir: &Path, subject: &str) -> Result<AttendanceTable, StoreError> {
    let files = session_files(dir, subject)?;
    if files.is_empty() {
        return Err(StoreError::NoSessions(subject.to_string()));
    }

    let mut sessions: Vec<LoadedSession> = Vec::new();
    for path in &files {
        match session::read_session(path) {
            Ok(loaded) => sessions.push(loaded),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping malformed session file");
            }
        }
    }
    if sessions.is_empty() {
        return Err(StoreError::NoSessions(subject.to_string()));
    }

    // Union of all date columns. Two sessions carrying the same date header
    // collapse into one column; presence is OR-ed across them.
    let mut columns: BTreeSet<String> = BTreeSet::new();
    for loaded in &sessions {
        columns.extend(loaded.date_columns.iter().cloned());
    }

    // Full outer union of rows keyed by (enrollment, name).
    let mut cells: BTreeMap<(String, String), BTreeMap<String, u8>> = BTreeMap::new();
    for loaded in &sessions {
        for row in &loaded.rows {
            let key = (row.enrollment.clone(), row.name.clone());
            let row_cells = cells.entry(key).or_default();
            for (column, &bit) in loaded.date_columns.iter().zip(&row.cells) {
                let cell = row_cells.entry(column.clone()).or_insert(0);
                *cell = (*cell).max(bit);
            }
        }
    }

    let date_columns: Vec<String> = columns.into_iter().collect();
    let rows = cells
        .into_iter()
        .map(|((enrollment, name), row_cells)| {
            let presence: Vec<u8> = date_columns
                .iter()
                .map(|col| row_cells.get(col).copied().unwrap_or(0))
                .collect();
            let percent = if date_columns.is_empty() {
                0
            } else {
                let mean = presence.iter().map(|&b| b as f64).sum::<f64>()
                    / date_columns.len() as f64;
                (mean * 100.0).round() as u32
            };
            AttendanceRow {
                enrollment,
                name,
                presence,
                percent,
            }
        })
        .collect();

    tracing::info!(
        subject,
        sessions = sessions.len(),
        skipped = files.len() - sessions.len(),
        "aggregated attendance"
    );

    Ok(AttendanceTable {
        subject: subject.to_string(),
        date_columns,
        rows,
    })
}

/// Write the consolidated table: `Enrollment,Name,<date...>,Attendance`.
/// Overwrites any previous consolidation.
pub fn write_table(path: &Path, table: &AttendanceTable) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;

    let mut header: Vec<&str> = vec!["Enrollment", "Name"];
    header.extend(table.date_columns.iter().map(String::as_str));
    header.push("Attendance");
    writer.write_record(&header)?;

    for row in &table.rows {
        let mut record: Vec<String> = vec![row.enrollment.clone(), row.name.clone()];
        record.extend(row.presence.iter().map(|b| b.to_string()));
        record.push(row.percent_display());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Aggregate a subject and persist the consolidated table in its directory.
pub fn aggregate_and_write(
    layout: &Layout,
    subject: &str,
) -> Result<(PathBuf, AttendanceTable), StoreError> {
    let table = aggregate(&layout.subject_dir(subject), subject)?;
    let path = layout.consolidated_path(subject);
    write_table(&path, &table)?;
    Ok((path, table))
}

/// Session files for a subject: `<subject>*.csv`, excluding the consolidated
/// output, sorted by name (which is chronological, given the file naming).
fn session_files(dir: &Path, subject: &str) -> Result<Vec<PathBuf>, StoreError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                return false;
            };
            name.starts_with(subject) && name.ends_with(".csv") && name != CONSOLIDATED_FILE
        })
        .collect();
    files.sort();
    Ok(files)
}
