//! Per-session attendance record: one file per (subject, date, time).
//!
//! Columns are `Enrollment,Name,<date>`; the date column holds 1 for every
//! row. A session that recognized nobody still produces the file (header
//! only); "ran, nobody recognized" must stay distinguishable from
//! "never ran".

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::StoreError;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H-%M-%S";

/// One capture window's worth of recognized identities. Immutable once
/// written; rows are unique by enrollment, first seen wins.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub subject: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    rows: Vec<(String, String)>,
}

impl SessionRecord {
    /// Start an empty record keyed by the session's start instant.
    pub fn new(subject: impl Into<String>, started_at: NaiveDateTime) -> Self {
        Self {
            subject: subject.into(),
            date: started_at.date(),
            time: started_at.time(),
            rows: Vec::new(),
        }
    }

    /// Record a presence. Returns false (and changes nothing) if this
    /// enrollment was already seen in the session.
    pub fn mark_present(&mut self, enrollment: impl Into<String>, name: impl Into<String>) -> bool {
        let enrollment = enrollment.into();
        if self.rows.iter().any(|(e, _)| *e == enrollment) {
            return false;
        }
        self.rows.push((enrollment, name.into()));
        true
    }

    pub fn rows(&self) -> &[(String, String)] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header label of this session's presence column.
    pub fn date_column(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    /// `<subject>_<YYYY-MM-DD>_<HH-MM-SS>.csv`
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}.csv",
            self.subject,
            self.date.format(DATE_FORMAT),
            self.time.format(TIME_FORMAT)
        )
    }
}

/// Persist one session record under `dir`, creating the directory as needed.
/// Written exactly once per capture window; never amended afterwards.
pub fn write_session(dir: &Path, record: &SessionRecord) -> Result<PathBuf, StoreError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(record.file_name());

    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(["Enrollment", "Name", record.date_column().as_str()])?;
    for (enrollment, name) in &record.rows {
        writer.write_record([enrollment.as_str(), name.as_str(), "1"])?;
    }
    writer.flush()?;

    tracing::info!(
        path = %path.display(),
        present = record.len(),
        "session record written"
    );
    Ok(path)
}

/// A session file as read back for aggregation. `cells` aligns with
/// `date_columns` (session files carry one date column, but the reader
/// tolerates more).
#[derive(Debug, Clone)]
pub struct LoadedSession {
    pub path: PathBuf,
    pub date_columns: Vec<String>,
    pub rows: Vec<LoadedRow>,
}

#[derive(Debug, Clone)]
pub struct LoadedRow {
    pub enrollment: String,
    pub name: String,
    pub cells: Vec<u8>,
}

/// Read a session file back. A file without an `Enrollment` column is a
/// [`StoreError::MalformedRecord`]; a missing `Name` column yields empty
/// names, and non-numeric cells count as absent.
pub fn read_session(path: &Path) -> Result<LoadedSession, StoreError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();

    let enrollment_idx = headers
        .iter()
        .position(|h| h == "Enrollment")
        .ok_or_else(|| StoreError::MalformedRecord {
            path: path.to_path_buf(),
            column: "Enrollment",
        })?;
    let name_idx = headers.iter().position(|h| h == "Name");

    let mut date_columns = Vec::new();
    let mut date_indices = Vec::new();
    for (idx, header) in headers.iter().enumerate() {
        if idx == enrollment_idx || Some(idx) == name_idx || header == "Attendance" {
            continue;
        }
        date_columns.push(header.to_string());
        date_indices.push(idx);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let Some(enrollment) = record.get(enrollment_idx).map(str::trim) else {
            continue;
        };
        if enrollment.is_empty() {
            continue;
        }
        let name = name_idx
            .and_then(|idx| record.get(idx))
            .unwrap_or("")
            .trim()
            .to_string();
        let cells = date_indices
            .iter()
            .map(|&idx| {
                record
                    .get(idx)
                    .and_then(|cell| cell.trim().parse::<u8>().ok())
                    .map(|v| v.min(1))
                    .unwrap_or(0)
            })
            .collect();
        rows.push(LoadedRow {
            enrollment: enrollment.to_string(),
            name,
            cells,
        });
    }

    Ok(LoadedSession {
        path: path.to_path_buf(),
        date_columns,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record() -> SessionRecord {
        let started = NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(9, 15, 30)
            .unwrap();
        SessionRecord::new("physics", started)
    }

    #[test]
    fn mark_present_dedupes_first_seen_wins() {
        let mut session = record();
        assert!(session.mark_present("E001", "Alice"));
        assert!(!session.mark_present("E001", "Someone Else"));
        assert!(session.mark_present("E002", "Bob"));
        assert_eq!(session.rows(), &[
            ("E001".to_string(), "Alice".to_string()),
            ("E002".to_string(), "Bob".to_string()),
        ]);
    }

    #[test]
    fn file_name_keys_subject_date_time() {
        assert_eq!(record().file_name(), "physics_2026-03-02_09-15-30.csv");
    }

    #[test]
    fn write_and_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut session = record();
        session.mark_present("E001", "Alice");
        session.mark_present("E002", "Bob");

        let path = write_session(dir.path(), &session).unwrap();
        let loaded = read_session(&path).unwrap();

        assert_eq!(loaded.date_columns, vec!["2026-03-02"]);
        assert_eq!(loaded.rows.len(), 2);
        assert_eq!(loaded.rows[0].enrollment, "E001");
        assert_eq!(loaded.rows[0].name, "Alice");
        assert_eq!(loaded.rows[0].cells, vec![1]);
    }

    #[test]
    fn empty_session_still_writes_a_file() {
        let dir = TempDir::new().unwrap();
        let path = write_session(dir.path(), &record()).unwrap();
        assert!(path.exists());

        let loaded = read_session(&path).unwrap();
        assert_eq!(loaded.date_columns, vec!["2026-03-02"]);
        assert!(loaded.rows.is_empty());
    }

    #[test]
    fn missing_enrollment_column_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.csv");
        std::fs::write(&path, "Id,Name,2026-03-02\nE001,Alice,1\n").unwrap();

        let err = read_session(&path).unwrap_err();
        assert!(matches!(err, StoreError::MalformedRecord { column: "Enrollment", .. }));
    }

    #[test]
    fn junk_cells_count_as_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("odd.csv");
        std::fs::write(
            &path,
            "Enrollment,Name,2026-03-02\nE001,Alice,yes\nE002,Bob,1\n,Ghost,1\n",
        )
        .unwrap();

        let loaded = read_session(&path).unwrap();
        assert_eq!(loaded.rows.len(), 2);
        assert_eq!(loaded.rows[0].cells, vec![0]);
        assert_eq!(loaded.rows[1].cells, vec![1]);
    }
}
