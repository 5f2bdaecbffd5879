use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading configuration or running a sync pass
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to fetch remote rows: {0}")]
    Fetch(String),

    #[error("failed to write row {row}: {message}")]
    Write { row: u32, message: String },

    #[error("row source error: {0}")]
    Source(String),

    #[error("io error: {0}")]
    Io(String),
}

/// Serializable tag for a `SyncError`, used in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    Configuration,
    Fetch,
    Write,
    Source,
    Io,
}

impl SyncError {
    pub fn configuration(message: impl Into<String>) -> Self {
        SyncError::Configuration(message.into())
    }

    pub fn fetch(message: impl Into<String>) -> Self {
        SyncError::Fetch(message.into())
    }

    pub fn write(row: u32, message: impl Into<String>) -> Self {
        SyncError::Write {
            row,
            message: message.into(),
        }
    }

    pub fn source(message: impl Into<String>) -> Self {
        SyncError::Source(message.into())
    }

    pub fn kind(&self) -> SyncErrorKind {
        match self {
            SyncError::Configuration(_) => SyncErrorKind::Configuration,
            SyncError::Fetch(_) => SyncErrorKind::Fetch,
            SyncError::Write { .. } => SyncErrorKind::Write,
            SyncError::Source(_) => SyncErrorKind::Source,
            SyncError::Io(_) => SyncErrorKind::Io,
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        SyncError::Io(e.to_string())
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
