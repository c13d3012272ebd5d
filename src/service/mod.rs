//! The request/response layer on top of a log.
//!
//! [`LogService`] turns the four operations clients call, Produce, Consume
//! and their streaming forms, into calls to a [`CommitLogApi`]. A client that
//! reads past the end of the log gets [`ServiceError::OffsetOutOfRange`], never
//! a generic failure.
//!
//! [`CommitLogApi`]: crate::api::commit_log_api::CommitLogApi
//! [`ServiceError::OffsetOutOfRange`]: crate::errors::ServiceError::OffsetOutOfRange

pub(crate) mod log_service;
pub(crate) mod messages;
pub(crate) mod streams;
