use std::io;

use crate::errors::InvalidSegmentFileName;
use crate::num;
use crate::segment::index::ENTRY_WIDTH;

/// Configuration for a commit log.
///
/// This struct holds the storage directory and the thresholds that decide
/// when the active segment rolls over.
///
/// Optional parameters are `Option<T>` in this struct, and default values is
/// evaluated when a getter method is called.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Directory storing the segment files. Created on open if missing.
    pub dir: String,

    /// Maximum number of batches in a segment.
    ///
    /// It also decides the pre-allocated size of an index file:
    /// `segment_max_records * 12` bytes.
    pub segment_max_records: Option<usize>,

    /// Maximum size of a segment store file in bytes.
    pub segment_max_size: Option<u64>,

    /// The offset assigned to the first batch ever appended: 0 or 1.
    pub initial_offset: Option<u64>,

    /// Size of the read buffer used when scanning a store file.
    pub read_buffer_size: Option<usize>,

    /// Whether to truncate the incomplete tail of a store file on open.
    ///
    /// If truncate, the segment is considered successfully opened.
    /// Otherwise, an io::Error will be returned.
    pub truncate_incomplete_record: Option<bool>,
}

impl Config {
    /// Creates a new Config with the specified directory and default values for
    /// other fields
    pub fn new(dir: impl ToString) -> Self {
        Self {
            dir: dir.to_string(),
            ..Default::default()
        }
    }

    /// Returns the maximum number of batches per segment (defaults to 1M)
    pub fn segment_max_records(&self) -> usize {
        self.segment_max_records.unwrap_or(1024 * 1024)
    }

    /// Returns the maximum store file size in bytes (defaults to 1GB)
    pub fn segment_max_size(&self) -> u64 {
        self.segment_max_size.unwrap_or(1024 * 1024 * 1024)
    }

    /// Returns the first offset of an empty log (defaults to 0)
    pub fn initial_offset(&self) -> u64 {
        self.initial_offset.unwrap_or_default()
    }

    /// Returns the size of read buffer in bytes (defaults to 64KB)
    pub fn read_buffer_size(&self) -> usize {
        self.read_buffer_size.unwrap_or(64 * 1024)
    }

    /// Returns whether to truncate incomplete records (defaults to true)
    pub fn truncate_incomplete_record(&self) -> bool {
        self.truncate_incomplete_record.unwrap_or(true)
    }

    /// The number of bytes an index file is pre-allocated to.
    pub(crate) fn index_capacity(&self) -> u64 {
        self.segment_max_records() as u64 * ENTRY_WIDTH
    }

    /// Check that every value can be honored by the on-disk format.
    ///
    /// Index entries store positions and relative offsets as u32, thus a
    /// segment can not grow beyond `u32::MAX` bytes or records.
    pub fn validate(&self) -> Result<(), io::Error> {
        let invalid =
            |msg: String| Err(io::Error::new(io::ErrorKind::InvalidInput, msg));

        if self.dir.is_empty() {
            return invalid("dir must not be empty".to_string());
        }

        let records = self.segment_max_records();
        if records == 0 || records as u64 > u32::MAX as u64 {
            return invalid(format!(
                "segment_max_records must be in [1, {}]: {}",
                u32::MAX,
                records
            ));
        }

        let size = self.segment_max_size();
        if size == 0 || size > u32::MAX as u64 {
            return invalid(format!(
                "segment_max_size must be in [1, {}]: {}",
                u32::MAX,
                size
            ));
        }

        let initial = self.initial_offset();
        if initial > 1 {
            return invalid(format!(
                "initial_offset must be 0 or 1: {}",
                initial
            ));
        }

        Ok(())
    }

    /// Returns the path of the store file of the segment at `base_offset`.
    pub fn store_path(&self, base_offset: u64) -> String {
        let file_name = Self::segment_file_name(base_offset, SegmentFile::Store);
        format!("{}/{}", self.dir, file_name)
    }

    /// Returns the path of the index file of the segment at `base_offset`.
    pub fn index_path(&self, base_offset: u64) -> String {
        let file_name = Self::segment_file_name(base_offset, SegmentFile::Index);
        format!("{}/{}", self.dir, file_name)
    }

    /// Generates the file name for a segment file.
    ///
    /// The file name format is "{padded_base_offset}.{store|index}"
    pub(crate) fn segment_file_name(base_offset: u64, kind: SegmentFile) -> String {
        format!("{}.{}", num::format_pad_u64(base_offset), kind.suffix())
    }

    /// Parses a segment file name and returns the base offset and which file
    /// of the segment it is.
    pub(crate) fn parse_segment_file_name(
        file_name: &str,
    ) -> Result<(u64, SegmentFile), InvalidSegmentFileName> {
        let (stem, suffix) = file_name.rsplit_once('.').ok_or_else(|| {
            InvalidSegmentFileName::new(file_name, "has no suffix")
        })?;

        let kind = SegmentFile::from_suffix(suffix).ok_or_else(|| {
            InvalidSegmentFileName::new(
                file_name,
                "suffix is neither '.store' nor '.index'",
            )
        })?;

        if stem.len() != 26 {
            return Err(InvalidSegmentFileName::new(
                file_name,
                "is not a 26 char padded offset",
            ));
        }

        if stem.chars().any(|c| !(c.is_ascii_digit() || c == '_')) {
            return Err(InvalidSegmentFileName::new(
                file_name,
                "contains chars other than digits and '_'",
            ));
        }

        let digits = stem.chars().filter(|c| *c != '_').collect::<String>();

        let base_offset = digits.parse::<u64>().map_err(|e| {
            InvalidSegmentFileName::new(
                file_name,
                format!("cannot parse as u64: {}", e),
            )
        })?;

        Ok((base_offset, kind))
    }
}

/// The two files a segment is persisted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SegmentFile {
    Store,
    Index,
}

impl SegmentFile {
    fn suffix(&self) -> &'static str {
        match self {
            SegmentFile::Store => "store",
            SegmentFile::Index => "index",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "store" => Some(SegmentFile::Store),
            "index" => Some(SegmentFile::Index),
            _ => None,
        }
    }
}
