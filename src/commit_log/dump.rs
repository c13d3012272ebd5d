use std::io;
use std::sync::Arc;

use crate::dump_writer;
use crate::segment::index::IndexEntry;
use crate::segment::Segment;
use crate::CommitLog;
use crate::Config;
use crate::RecordBatch;
use crate::SegmentId;

/// Print the content of the store files in a directory, for debugging.
///
/// It reads the files directly and does not need the directory lock, so it
/// can inspect a directory that is in use by a [`CommitLog`].
pub struct Dump {
    config: Arc<Config>,
}

impl Dump {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub fn write_to_string(&self) -> Result<String, io::Error> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        String::from_utf8(buf).map_err(io::Error::other)
    }

    pub fn write<W: io::Write>(&self, mut w: W) -> Result<(), io::Error> {
        writeln!(&mut w, "CommitLog:")?;
        self.write_with(w, dump_writer::multiline_string)
    }

    /// Call `write_record` for every batch of every segment, in offset order.
    ///
    /// A damaged batch is passed as an `Err` and ends the segment it is in;
    /// the following segments are still dumped.
    pub fn write_with<W: io::Write, D>(
        &self,
        mut w: W,
        write_record: D,
    ) -> Result<(), io::Error>
    where
        D: Fn(
            &mut W,
            SegmentId,
            Result<(IndexEntry, RecordBatch), io::Error>,
        ) -> Result<(), io::Error>,
    {
        let config = self.config.as_ref();
        let segment_ids = CommitLog::load_segment_ids(config)?;
        for segment_id in segment_ids {
            let it = Segment::dump(config, segment_id)?;
            for res in it {
                write_record(&mut w, segment_id, res)?;
            }
        }
        Ok(())
    }
}
