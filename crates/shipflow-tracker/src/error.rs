use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("History file is corrupt: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Could not determine the user data directory")]
    DataDirNotFound,

    #[error("History is locked by {holder} since {since}")]
    Locked {
        holder: String,
        since: DateTime<Utc>,
    },

    #[error("Deployment record not found: {0}")]
    RecordNotFound(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
