use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("malformed record in {path}: missing required column '{column}'")]
    MalformedRecord { path: PathBuf, column: &'static str },
    #[error("no usable session files for subject '{0}'")]
    NoSessions(String),
    #[error("enrollment '{0}' is already registered")]
    DuplicateEnrollment(String),
    #[error("enrollment '{0}' is not registered")]
    UnknownEnrollment(String),
    #[error("persistence failed: {0}")]
    Persistence(#[from] std::io::Error),
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
}
