//! Lectio error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LectioError>;

#[derive(Debug, Error)]
pub enum LectioError {
    #[error("Config error: {0}")]
    Config(String),

    /// Timetable upstream failure, surfaced after retry exhaustion.
    #[error("Timetable API error: {0}")]
    Api(String),

    /// Storage failures are fatal to the current operation; callers do not
    /// attempt local recovery.
    #[error("Storage error: {0}")]
    Store(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
