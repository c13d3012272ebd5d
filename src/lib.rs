//! An append-only commit log:
//! a durable, offset-addressed store of record batches, the storage core of a
//! Kafka-like broker.
//!
//! ## Features
//!
//! - Every appended [`RecordBatch`] is assigned the next offset, starting at
//!   0 or 1, and can be read back by that offset
//! - Storage is split into segments, each a store file of marshalled batches
//!   plus a memory mapped index file of fixed width entries
//! - A full segment is sealed and a new one is created starting at the next
//!   offset
//! - Recovery on open: incomplete appends are discarded and a missing index
//!   is rebuilt from its store file
//! - Appends are serialized, reads run concurrently: a [`CommitLog`] is
//!   shared between threads with an `Arc`
//! - A request/response layer, [`LogService`], serving Produce, Consume and
//!   their streaming forms
//!
//! ## Example
//!
//! See `demos/basic_usage.rs` for a complete demonstration, including
//! rollover, reopening and truncation.
//!
//! Basic usage:
//!
//! ```rust
//! # use std::sync::Arc;
//! use commit_log::{CommitLog, Config, RecordBatch};
//! use commit_log::{ConsumeRequest, LogService, ProduceRequest};
//!
//! let temp_dir = tempfile::tempdir().unwrap();
//! let config = Arc::new(Config::new(temp_dir.path().to_str().unwrap()));
//!
//! let log = Arc::new(CommitLog::open(config).unwrap());
//!
//! // Append directly to the log
//! let offset = log.append_batch(&RecordBatch::from_values(["hello world"])).unwrap();
//! assert_eq!(0, offset);
//!
//! // Or through the service layer
//! let svc = LogService::new(log.clone());
//! let resp = svc.produce(ProduceRequest::new(RecordBatch::from_values(["second"]))).unwrap();
//! assert_eq!(1, resp.first_offset);
//!
//! // Consume every batch from offset 0 until the end of the log
//! let mut got = vec![];
//! for res in svc.consume_stream(ConsumeRequest::new(0)) {
//!     match res {
//!         Ok(resp) => got.push(resp.record_batch.records[0].value.clone()),
//!         Err(e) if e.is_offset_out_of_range() => break,
//!         Err(e) => panic!("{}", e),
//!     }
//! }
//! assert_eq!(vec![b"hello world".to_vec(), b"second".to_vec()], got);
//! ```

mod commit_log;
mod config;
mod record_batch;
mod segment;
mod service;

pub(crate) mod file_lock;
pub(crate) mod num;
pub(crate) mod offset_reader;

#[cfg(test)]
pub(crate) mod testing;

pub use codeq;

pub mod api;
pub mod dump_writer;
pub mod errors;

pub use api::commit_log_api::CommitLogApi;
pub use commit_log::stat::SegmentStat;
pub use commit_log::stat::Stat;
pub use config::Config;
pub use record_batch::Record;
pub use record_batch::RecordBatch;
pub use segment::index::IndexEntry;
pub use segment::segment_id::SegmentId;
pub use service::log_service::LogService;
pub use service::messages::ConsumeRequest;
pub use service::messages::ConsumeResponse;
pub use service::messages::ProduceRequest;
pub use service::messages::ProduceResponse;
pub use service::streams::CancelHandle;
pub use service::streams::ConsumeStream;
pub use service::streams::ProduceStream;

pub use self::commit_log::commit_log::CommitLog;
pub use self::commit_log::dump::Dump;

#[cfg(test)]
mod tests;
