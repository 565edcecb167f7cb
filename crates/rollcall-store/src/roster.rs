//! Identity directory file: `Enrollment,Name,RegisteredOn`.
//!
//! Registration is the only place enrollment uniqueness is enforced; reads
//! are tolerant of odd rows so one bad record never takes down resolution.

use std::fs::OpenOptions;
use std::path::Path;

use rollcall_core::{Identity, Roster};

use crate::error::StoreError;

const REGISTERED_ON_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Load all identity records. A missing file is an empty directory, not an
/// error; rows that fail to parse are skipped with a warning.
pub fn load_identities(path: &Path) -> Result<Vec<Identity>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut identities = Vec::new();
    for row in reader.deserialize::<Identity>() {
        match row {
            Ok(identity) if !identity.enrollment.trim().is_empty() => {
                identities.push(identity);
            }
            Ok(_) => tracing::warn!(path = %path.display(), "skipping row with empty enrollment"),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping unreadable roster row");
            }
        }
    }
    Ok(identities)
}

/// Load the directory as a lookup roster (enrollment → name).
pub fn load_roster(path: &Path) -> Result<Roster, StoreError> {
    Ok(Roster::from_identities(load_identities(path)?))
}

/// Register a new identity, stamping it with the current local time.
///
/// Fails with [`StoreError::DuplicateEnrollment`] if the key already exists
/// (case-insensitive, matching how removal matches keys).
pub fn register(path: &Path, enrollment: &str, name: &str) -> Result<Identity, StoreError> {
    let enrollment = enrollment.trim();
    let name = name.trim();

    let existing = load_identities(path)?;
    if existing
        .iter()
        .any(|id| id.enrollment.trim().eq_ignore_ascii_case(enrollment))
    {
        return Err(StoreError::DuplicateEnrollment(enrollment.to_string()));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let identity = Identity {
        enrollment: enrollment.to_string(),
        name: name.to_string(),
        registered_on: chrono::Local::now().format(REGISTERED_ON_FORMAT).to_string(),
    };

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let needs_header = file.metadata()?.len() == 0;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file);
    writer.serialize(&identity)?;
    writer.flush()?;

    tracing::info!(enrollment, name, "registered identity");
    Ok(identity)
}

/// Remove an identity by enrollment (case-insensitive) and rewrite the file.
///
/// A timestamped `.bak` copy is taken first; backup failure is logged but
/// does not block the removal.
pub fn remove(path: &Path, enrollment: &str) -> Result<Identity, StoreError> {
    let identities = load_identities(path)?;
    let wanted = enrollment.trim();

    let (removed, kept): (Vec<Identity>, Vec<Identity>) = identities
        .into_iter()
        .partition(|id| id.enrollment.trim().eq_ignore_ascii_case(wanted));

    let Some(removed) = removed.into_iter().next() else {
        return Err(StoreError::UnknownEnrollment(wanted.to_string()));
    };

    let backup = path.with_extension(format!("csv.bak.{}", chrono::Utc::now().timestamp()));
    if let Err(err) = std::fs::copy(path, &backup) {
        tracing::warn!(path = %path.display(), error = %err, "roster backup failed");
    }

    let mut writer = csv::Writer::from_path(path)?;
    for identity in &kept {
        writer.serialize(identity)?;
    }
    writer.flush()?;

    tracing::info!(enrollment = %removed.enrollment, "removed identity");
    Ok(removed)
}
