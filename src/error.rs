//! Error types for event-log reconstruction and archive access.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while reconstructing or binning one sensor-day of vehicle events.
///
/// `index` is the position of the offending event in the original log order.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("non-positive headway {headway} ms derived at event {index}")]
    NonPositiveHeadway { index: usize, headway: i64 },
    #[error("event {index} has no resolvable timestamp")]
    UnresolvedTimestamp { index: usize },
    #[error("timestamp {stamp} ms at event {index} falls outside the day")]
    PeriodOutOfRange { index: usize, stamp: i64 },
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive entry not found: {district}/{date}/{name}")]
    NotFound {
        district: String,
        date: String,
        name: String,
    },
    #[error("invalid year: {0:?}")]
    InvalidYear(String),
    #[error("invalid date: {0:?}")]
    InvalidDate(String),
    #[error("invalid sample file name: {0:?}")]
    InvalidFileName(String),
    #[error("invalid district: {0:?}")]
    InvalidDistrict(String),
    #[error(transparent)]
    Event(#[from] EventError),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    /// True when no storage tier holds the requested entry.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArchiveError::NotFound { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ArchiveError::Io {
            path: path.into(),
            source,
        }
    }
}
