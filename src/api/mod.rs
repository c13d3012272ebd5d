//! Core API interfaces of the commit log.

pub mod commit_log_api;
