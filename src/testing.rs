//! Test doubles and helpers shared by unit tests.

use std::io;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;

use crate::api::commit_log_api::CommitLogApi;
use crate::errors::LogError;
use crate::errors::OffsetOutOfRange;
use crate::RecordBatch;

/// A log kept in memory, assigning offsets the same way as
/// [`CommitLog`](crate::CommitLog).
///
/// An optional capacity makes appends fail once it is reached, to test how
/// failures are reported.
#[derive(Debug)]
pub(crate) struct MemLog {
    base_offset: u64,
    capacity: Option<usize>,
    batches: Mutex<Vec<RecordBatch>>,
    reads: AtomicU64,
}

impl MemLog {
    pub(crate) fn new(base_offset: u64) -> Self {
        Self {
            base_offset,
            capacity: None,
            batches: Mutex::new(vec![]),
            reads: AtomicU64::new(0),
        }
    }

    pub(crate) fn with_capacity(base_offset: u64, capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new(base_offset)
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.batches.lock().len()
    }

    /// Number of `read_batch` calls so far.
    pub(crate) fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

impl CommitLogApi for MemLog {
    fn append_batch(&self, batch: &RecordBatch) -> Result<u64, LogError> {
        let mut batches = self.batches.lock();

        if Some(batches.len()) == self.capacity {
            let err = io::Error::new(io::ErrorKind::Other, "MemLog is full");
            return Err(err.into());
        }

        batches.push(batch.clone());
        Ok(self.base_offset + batches.len() as u64 - 1)
    }

    fn read_batch(&self, offset: u64) -> Result<RecordBatch, LogError> {
        self.reads.fetch_add(1, Ordering::Relaxed);

        let batches = self.batches.lock();

        let i = offset
            .checked_sub(self.base_offset)
            .ok_or_else(|| OffsetOutOfRange::new(offset))?;

        let batch = batches
            .get(i as usize)
            .ok_or_else(|| OffsetOutOfRange::new(offset))?;

        Ok(batch.clone())
    }
}

/// Build a batch with one record per value.
pub(crate) fn batch(values: &[&str]) -> RecordBatch {
    RecordBatch::from_values(values.iter().map(|v| v.as_bytes().to_vec()))
}

/// The values of all records in a batch, as strings.
pub(crate) fn values(batch: &RecordBatch) -> Vec<String> {
    batch
        .records
        .iter()
        .map(|r| String::from_utf8_lossy(&r.value).to_string())
        .collect()
}
