use crate::RecordBatch;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProduceRequest {
    pub record_batch: RecordBatch,
}

impl ProduceRequest {
    pub fn new(record_batch: RecordBatch) -> Self {
        Self { record_batch }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProduceResponse {
    /// The offset assigned to the produced batch.
    pub first_offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeRequest {
    pub offset: u64,
}

impl ConsumeRequest {
    pub fn new(offset: u64) -> Self {
        Self { offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumeResponse {
    pub record_batch: RecordBatch,
}
