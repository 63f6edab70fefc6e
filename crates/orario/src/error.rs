use thiserror::Error;

use crate::export::ExportFormat;

/// Errors raised by the timetable core and the preference store
#[derive(Debug, Error)]
pub enum TimetableError {
    /// A time label such as "8:00" could not be read
    #[error("invalid time of day: {0:?}")]
    InvalidTime(String),

    /// A time range label such as "8:00-8:50" could not be read
    #[error("invalid time range: {0:?}")]
    InvalidTimeRange(String),

    /// The export format is known but has no implementation
    #[error("{0} export is not supported yet")]
    UnsupportedExport(ExportFormat),

    /// A week navigation offset outside the representable calendar
    #[error("week offset {0} is out of range")]
    InvalidWeek(i32),

    /// An export format name that is not recognized at all
    #[error("unknown export format: {0:?}")]
    UnknownExportFormat(String),

    #[error("preference storage failed: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TimetableError>;
