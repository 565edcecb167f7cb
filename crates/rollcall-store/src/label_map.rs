//! Label-mapping file: `Label,Enrollment`, one row per trainer-assigned label.

use std::collections::BTreeMap;
use std::path::Path;

use rollcall_core::LabelMap;
use serde::Deserialize;

use crate::error::StoreError;

#[derive(Debug, Deserialize)]
struct LabelRow {
    #[serde(rename = "Label")]
    label: String,
    #[serde(rename = "Enrollment")]
    enrollment: String,
}

/// Load the trainer-produced label mapping.
///
/// The mapping is advisory input from an external collaborator, so loading
/// is lenient: a missing file yields an empty map, unparsable rows are
/// skipped, and an enrollment appearing under several labels (the trainer
/// intends the map to be injective) is reported but kept.
pub fn load_label_map(path: &Path) -> Result<LabelMap, StoreError> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "label map not found; resolution will rely on fallback strategies");
        return Ok(LabelMap::new());
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut map = LabelMap::new();
    for row in reader.deserialize::<LabelRow>() {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping unreadable label row");
                continue;
            }
        };
        let enrollment = row.enrollment.trim();
        let Ok(label) = row.label.trim().parse::<u32>() else {
            tracing::warn!(path = %path.display(), label = %row.label, "skipping non-numeric label");
            continue;
        };
        if enrollment.is_empty() {
            tracing::warn!(path = %path.display(), label, "skipping label with empty enrollment");
            continue;
        }
        map.insert(label, enrollment);
    }

    warn_on_duplicate_enrollments(&map);
    Ok(map)
}

/// Write a label mapping with the `Label,Enrollment` contract headers.
pub fn write_label_map(path: &Path, map: &LabelMap) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["Label", "Enrollment"])?;
    for (label, enrollment) in map.iter() {
        writer.write_record([label.to_string().as_str(), enrollment])?;
    }
    writer.flush()?;
    Ok(())
}

fn warn_on_duplicate_enrollments(map: &LabelMap) {
    let mut seen: BTreeMap<&str, u32> = BTreeMap::new();
    for (label, enrollment) in map.iter() {
        if let Some(first) = seen.insert(enrollment, label) {
            tracing::warn!(
                enrollment,
                first_label = first,
                second_label = label,
                "enrollment mapped from multiple labels"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("label_map.csv");

        let mut map = LabelMap::new();
        map.insert(0, "E001");
        map.insert(3, "E007");
        write_label_map(&path, &map).unwrap();

        let loaded = load_label_map(&path).unwrap();
        assert_eq!(loaded.get(0), Some("E001"));
        assert_eq!(loaded.get(3), Some("E007"));
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn missing_file_yields_empty_map() {
        let dir = TempDir::new().unwrap();
        let map = load_label_map(&dir.path().join("nope.csv")).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn bad_rows_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("label_map.csv");
        std::fs::write(
            &path,
            "Label,Enrollment\n0,E001\nnot-a-number,E002\n2,\n3,E004\n",
        )
        .unwrap();

        let map = load_label_map(&path).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(0), Some("E001"));
        assert_eq!(map.get(3), Some("E004"));
    }
}
