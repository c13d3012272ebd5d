use std::iter::FusedIterator;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::debug;
use log::info;

use crate::api::commit_log_api::CommitLogApi;
use crate::errors::ServiceError;
use crate::service::log_service::consume;
use crate::service::log_service::produce;
use crate::service::messages::ConsumeRequest;
use crate::service::messages::ConsumeResponse;
use crate::service::messages::ProduceRequest;
use crate::service::messages::ProduceResponse;

/// Stop a [`ConsumeStream`] from another thread.
///
/// All clones share one flag. Once cancelled, the stream issues no more reads
/// and yields `None`.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Responses to a sequence of [`ProduceRequest`]s, see
/// [`LogService::produce_stream`](crate::LogService::produce_stream).
pub struct ProduceStream<L, I> {
    log: Arc<L>,
    inbound: I,
    done: bool,
}

impl<L, I> ProduceStream<L, I> {
    pub(crate) fn new(log: Arc<L>, inbound: I) -> Self {
        Self {
            log,
            inbound,
            done: false,
        }
    }
}

impl<L, I> Iterator for ProduceStream<L, I>
where
    L: CommitLogApi,
    I: Iterator<Item = ProduceRequest>,
{
    type Item = Result<ProduceResponse, ServiceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let Some(req) = self.inbound.next() else {
            self.done = true;
            return None;
        };

        let res = produce(self.log.as_ref(), req);
        if let Err(e) = &res {
            info!("ProduceStream aborted: {}", e);
            self.done = true;
        }
        Some(res)
    }
}

impl<L, I> FusedIterator for ProduceStream<L, I>
where
    L: CommitLogApi,
    I: Iterator<Item = ProduceRequest>,
{
}

/// Batches read at consecutive offsets, see
/// [`LogService::consume_stream`](crate::LogService::consume_stream).
///
/// The stream ends in one of three ways:
/// - it reaches an offset with nothing stored: it yields
///   [`ServiceError::OffsetOutOfRange`] once, then `None`;
/// - a read fails for another reason: it yields that error, then `None`;
/// - it is cancelled through a [`CancelHandle`]: it yields `None` without
///   reading again.
///
/// Dropping the stream cancels its handle.
pub struct ConsumeStream<L> {
    log: Arc<L>,
    offset: u64,
    cancel: CancelHandle,
    done: bool,
}

impl<L> ConsumeStream<L> {
    pub(crate) fn new(log: Arc<L>, offset: u64) -> Self {
        Self {
            log,
            offset,
            cancel: CancelHandle::new(),
            done: false,
        }
    }

    /// Use `cancel` instead of the handle this stream created.
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// The offset the next read will be issued for.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl<L> Iterator for ConsumeStream<L>
where L: CommitLogApi
{
    type Item = Result<ConsumeResponse, ServiceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.cancel.is_cancelled() {
            debug!("ConsumeStream cancelled at offset {}", self.offset);
            self.done = true;
            return None;
        }

        let res = consume(self.log.as_ref(), ConsumeRequest::new(self.offset));
        match &res {
            Ok(_) => {
                self.offset += 1;
            }
            Err(e) => {
                if !e.is_offset_out_of_range() {
                    info!("ConsumeStream aborted at offset {}: {}", self.offset, e);
                }
                self.done = true;
            }
        }
        Some(res)
    }
}

impl<L> FusedIterator for ConsumeStream<L> where L: CommitLogApi {}

impl<L> Drop for ConsumeStream<L> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::CancelHandle;
    use crate::errors::ServiceError;
    use crate::service::messages::ConsumeRequest;
    use crate::service::messages::ProduceRequest;
    use crate::testing::batch;
    use crate::testing::values;
    use crate::testing::MemLog;
    use crate::LogService;

    fn produce_all(svc: &LogService<MemLog>, vs: &[&str]) {
        for v in vs {
            svc.produce(ProduceRequest::new(batch(&[*v]))).unwrap();
        }
    }

    #[test]
    fn test_produce_stream() -> Result<(), ServiceError> {
        let svc = LogService::new(Arc::new(MemLog::new(0)));

        let reqs = ["a", "b", "c"].map(|v| ProduceRequest::new(batch(&[v])));
        let offsets = svc
            .produce_stream(reqs)
            .map(|r| r.map(|resp| resp.first_offset))
            .collect::<Result<Vec<_>, _>>()?;

        assert_eq!(vec![0, 1, 2], offsets);
        Ok(())
    }

    #[test]
    fn test_produce_stream_is_lazy() {
        let svc = LogService::new(Arc::new(MemLog::new(0)));

        let reqs = ["a", "b"].map(|v| ProduceRequest::new(batch(&[v])));
        let mut stream = svc.produce_stream(reqs);

        assert_eq!(0, stream.next().unwrap().unwrap().first_offset);
        assert_eq!(1, svc.log().len(), "second request not pulled yet");

        assert_eq!(1, stream.next().unwrap().unwrap().first_offset);
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_produce_stream_aborts_on_failure() {
        let svc = LogService::new(Arc::new(MemLog::with_capacity(0, 2)));

        let reqs = ["a", "b", "c", "d"].map(|v| ProduceRequest::new(batch(&[v])));
        let mut stream = svc.produce_stream(reqs);

        assert!(stream.next().unwrap().is_ok());
        assert!(stream.next().unwrap().is_ok());

        let err = stream.next().unwrap().unwrap_err();
        assert!(matches!(err, ServiceError::Log(_)), "{}", err);

        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
        assert_eq!(2, svc.log().len());
    }

    #[test]
    fn test_consume_stream_ends_with_out_of_range() {
        let svc = LogService::new(Arc::new(MemLog::new(0)));
        produce_all(&svc, &["hello world", "second"]);

        let mut stream = svc.consume_stream(ConsumeRequest::new(0));

        let got = stream.next().unwrap().unwrap();
        assert_eq!(vec!["hello world"], values(&got.record_batch));

        let got = stream.next().unwrap().unwrap();
        assert_eq!(vec!["second"], values(&got.record_batch));

        let err = stream.next().unwrap().unwrap_err();
        assert!(err.is_offset_out_of_range(), "{}", err);
        assert_eq!(2, stream.offset());

        assert!(stream.next().is_none());
    }

    #[test]
    fn test_consume_stream_from_middle() {
        let svc = LogService::new(Arc::new(MemLog::new(0)));
        produce_all(&svc, &["a", "b", "c"]);

        let got = svc
            .consume_stream(ConsumeRequest::new(1))
            .map_while(|r| r.ok())
            .map(|resp| values(&resp.record_batch).join(","))
            .collect::<Vec<_>>();

        assert_eq!(vec!["b", "c"], got);
    }

    #[test]
    fn test_consume_stream_cancel() {
        let svc = LogService::new(Arc::new(MemLog::new(0)));
        produce_all(&svc, &["a", "b", "c"]);

        let cancel = CancelHandle::new();
        let mut stream = svc
            .consume_stream(ConsumeRequest::new(0))
            .with_cancel_handle(cancel.clone());

        assert!(stream.next().unwrap().is_ok());

        cancel.cancel();
        assert_eq!(1, svc.log().reads());

        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
        assert_eq!(1, svc.log().reads(), "no read after cancel");
        assert_eq!(1, stream.offset());
    }

    #[test]
    fn test_consume_stream_cancel_from_other_thread() {
        let svc = LogService::new(Arc::new(MemLog::new(0)));
        produce_all(&svc, &["a"]);

        let stream = svc.consume_stream(ConsumeRequest::new(0));
        let cancel = stream.cancel_handle();

        std::thread::spawn(move || cancel.cancel()).join().unwrap();

        assert_eq!(0, stream.count());
        assert_eq!(0, svc.log().reads());
    }

    #[test]
    fn test_drop_consume_stream_cancels() {
        let svc = LogService::new(Arc::new(MemLog::new(0)));

        let stream = svc.consume_stream(ConsumeRequest::new(0));
        let cancel = stream.cancel_handle();
        assert!(!cancel.is_cancelled());

        drop(stream);
        assert!(cancel.is_cancelled());
    }
}
