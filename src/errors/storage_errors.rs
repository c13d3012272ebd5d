/// A file in the storage directory whose name is not `<padded-offset>.store`
/// or `<padded-offset>.index`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("Invalid segment file name: {bad_file_name}: {reason}")]
pub struct InvalidSegmentFileName {
    pub bad_file_name: String,
    pub reason: String,
}

impl InvalidSegmentFileName {
    pub fn new(bad_file_name: impl ToString, reason: impl ToString) -> Self {
        Self {
            bad_file_name: bad_file_name.to_string(),
            reason: reason.to_string(),
        }
    }
}
