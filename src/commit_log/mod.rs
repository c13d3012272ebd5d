#[allow(clippy::module_inception)]
pub(crate) mod commit_log;
pub(crate) mod dump;
pub(crate) mod stat;
