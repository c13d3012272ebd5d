//! Define the interface the protocol layer uses to reach a log.
//!
//! [`LogService`](crate::LogService) only needs to append a batch and to read
//! one back by offset. Hiding the log behind this trait lets the service run
//! on top of the on-disk [`CommitLog`](crate::CommitLog) or on any other
//! storage that assigns offsets the same way.

use crate::errors::LogError;
use crate::RecordBatch;

/// Append and read batches by offset.
///
/// Implementations must be safe to call from multiple threads at once:
/// offsets are assigned in append order, starting at a fixed base and
/// increasing by one per batch without reuse.
pub trait CommitLogApi: Send + Sync {
    /// Store `batch` and return the offset assigned to it.
    ///
    /// The stored batch is returned by a later [`Self::read_batch`] unchanged,
    /// including its `first_offset`.
    fn append_batch(&self, batch: &RecordBatch) -> Result<u64, LogError>;

    /// Read the batch stored at `offset`.
    ///
    /// Returns an error for which
    /// [`LogError::is_offset_out_of_range`] is true if nothing is stored at
    /// this offset.
    fn read_batch(&self, offset: u64) -> Result<RecordBatch, LogError>;
}
