mod storage_errors;

use std::io;

pub use storage_errors::InvalidSegmentFileName;

/// Errors returned by the storage engine: [`CommitLog`](crate::CommitLog) and
/// the segments it owns.
#[derive(Debug)]
#[derive(thiserror::Error)]
pub enum LogError {
    #[error(transparent)]
    OffsetOutOfRange(#[from] OffsetOutOfRange),

    #[error(transparent)]
    OffsetNotFound(#[from] OffsetNotFound),

    #[error(transparent)]
    Corrupted(#[from] CorruptedBatch),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LogError {
    /// Returns true if the requested offset is not stored in the log, either
    /// because no segment covers it or because the segment has no index entry
    /// for it.
    pub fn is_offset_out_of_range(&self) -> bool {
        matches!(self, Self::OffsetOutOfRange(_) | Self::OffsetNotFound(_))
    }
}

impl From<LogError> for io::Error {
    fn from(value: LogError) -> Self {
        match value {
            LogError::OffsetOutOfRange(e) => {
                io::Error::new(io::ErrorKind::NotFound, e.to_string())
            }
            LogError::OffsetNotFound(e) => {
                io::Error::new(io::ErrorKind::NotFound, e.to_string())
            }
            LogError::Corrupted(e) => {
                io::Error::new(io::ErrorKind::InvalidData, e.to_string())
            }
            LogError::Io(e) => e,
        }
    }
}

/// Errors returned by the request/response layer.
///
/// Out of range is kept apart from every other failure: it is the expected
/// answer when a consumer reaches the end of the log.
#[derive(Debug)]
#[derive(thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    OffsetOutOfRange(#[from] OffsetOutOfRange),

    #[error(transparent)]
    Log(LogError),
}

impl ServiceError {
    pub fn is_offset_out_of_range(&self) -> bool {
        matches!(self, Self::OffsetOutOfRange(_))
    }
}

impl From<LogError> for ServiceError {
    fn from(value: LogError) -> Self {
        match value {
            LogError::OffsetOutOfRange(e) => Self::OffsetOutOfRange(e),
            LogError::OffsetNotFound(e) => {
                Self::OffsetOutOfRange(OffsetOutOfRange::new(e.offset))
            }
            other => Self::Log(other),
        }
    }
}

impl From<ServiceError> for io::Error {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::OffsetOutOfRange(e) => {
                io::Error::new(io::ErrorKind::NotFound, e.to_string())
            }
            ServiceError::Log(e) => e.into(),
        }
    }
}

/// No segment in the log contains the requested offset.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("Offset out of range: {offset}")]
pub struct OffsetOutOfRange {
    pub offset: u64,
}

impl OffsetOutOfRange {
    pub fn new(offset: u64) -> Self {
        Self { offset }
    }
}

/// The segment that should contain an offset has no index entry for it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("Offset not found: {offset} in segment based at {base_offset}")]
pub struct OffsetNotFound {
    pub offset: u64,
    pub base_offset: u64,
}

impl OffsetNotFound {
    pub fn new(offset: u64, base_offset: u64) -> Self {
        Self {
            offset,
            base_offset,
        }
    }
}

/// Stored bytes at an offset can not be decoded into a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("Corrupted batch at offset {offset}: {reason}")]
pub struct CorruptedBatch {
    pub offset: u64,
    pub reason: String,
}

impl CorruptedBatch {
    pub fn new(offset: u64, reason: impl ToString) -> Self {
        Self {
            offset,
            reason: reason.to_string(),
        }
    }
}
