use std::sync::Arc;

use log::debug;

use crate::api::commit_log_api::CommitLogApi;
use crate::errors::ServiceError;
use crate::service::messages::ConsumeRequest;
use crate::service::messages::ConsumeResponse;
use crate::service::messages::ProduceRequest;
use crate::service::messages::ProduceResponse;
use crate::service::streams::ConsumeStream;
use crate::service::streams::ProduceStream;

/// Serve Produce and Consume requests, one at a time or as streams, from a
/// shared log.
///
/// A `LogService` holds no state besides the log. It is cheap to clone and
/// every clone serves the same log.
#[derive(Debug)]
pub struct LogService<L> {
    log: Arc<L>,
}

impl<L> Clone for LogService<L> {
    fn clone(&self) -> Self {
        Self {
            log: self.log.clone(),
        }
    }
}

impl<L> LogService<L>
where L: CommitLogApi
{
    pub fn new(log: Arc<L>) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &Arc<L> {
        &self.log
    }

    /// Append the batch in `req` and return the offset assigned to it.
    ///
    /// Any failure of the log is returned as [`ServiceError::Log`].
    pub fn produce(
        &self,
        req: ProduceRequest,
    ) -> Result<ProduceResponse, ServiceError> {
        produce(self.log.as_ref(), req)
    }

    /// Read the batch at `req.offset`.
    ///
    /// Returns [`ServiceError::OffsetOutOfRange`] if nothing is stored at
    /// this offset, yet or anymore.
    pub fn consume(
        &self,
        req: ConsumeRequest,
    ) -> Result<ConsumeResponse, ServiceError> {
        consume(self.log.as_ref(), req)
    }

    /// Produce every request of `inbound` in order.
    ///
    /// The returned stream is lazy: the next inbound request is pulled only
    /// after the response to the previous one has been taken. It ends when
    /// `inbound` ends, or right after yielding the first failure.
    pub fn produce_stream<I>(&self, inbound: I) -> ProduceStream<L, I::IntoIter>
    where I: IntoIterator<Item = ProduceRequest> {
        ProduceStream::new(self.log.clone(), inbound.into_iter())
    }

    /// Consume batches starting at `req.offset`, one offset after another.
    ///
    /// The stream yields every batch until it reaches an offset with nothing
    /// stored, then yields [`ServiceError::OffsetOutOfRange`] once and ends.
    /// See [`ConsumeStream`] for cancellation.
    pub fn consume_stream(&self, req: ConsumeRequest) -> ConsumeStream<L> {
        ConsumeStream::new(self.log.clone(), req.offset)
    }
}

pub(crate) fn produce<L>(
    log: &L,
    req: ProduceRequest,
) -> Result<ProduceResponse, ServiceError>
where
    L: CommitLogApi + ?Sized,
{
    let first_offset =
        log.append_batch(&req.record_batch).map_err(ServiceError::Log)?;

    debug!("Produced batch at offset {}", first_offset);

    Ok(ProduceResponse { first_offset })
}

pub(crate) fn consume<L>(
    log: &L,
    req: ConsumeRequest,
) -> Result<ConsumeResponse, ServiceError>
where
    L: CommitLogApi + ?Sized,
{
    let record_batch = log.read_batch(req.offset)?;
    Ok(ConsumeResponse { record_batch })
}
