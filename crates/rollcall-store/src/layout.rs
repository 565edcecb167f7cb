use std::path::{Path, PathBuf};

/// On-disk layout of the attendance data directory.
///
/// ```text
/// <root>/roster/roster.csv               identity directory
/// <root>/model/label_map.csv             trainer-produced label mapping
/// <root>/attendance/<subject>/...        per-session records
/// <root>/attendance/<subject>/attendance.csv   consolidated table
/// ```
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Layout rooted at `ROLLCALL_DATA_DIR`, falling back to
    /// `$XDG_DATA_HOME/rollcall` (or `~/.local/share/rollcall`).
    pub fn from_env() -> Self {
        let root = std::env::var("ROLLCALL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::var("XDG_DATA_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| {
                        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                        PathBuf::from(home).join(".local/share")
                    })
                    .join("rollcall")
            });
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn roster_path(&self) -> PathBuf {
        self.root.join("roster").join("roster.csv")
    }

    pub fn label_map_path(&self) -> PathBuf {
        self.root.join("model").join("label_map.csv")
    }

    pub fn subject_dir(&self, subject: &str) -> PathBuf {
        self.root.join("attendance").join(subject)
    }

    pub fn consolidated_path(&self, subject: &str) -> PathBuf {
        self.subject_dir(subject).join("attendance.csv")
    }
}
