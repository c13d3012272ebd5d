use std::io;

use codeq::error_context_ext::ErrorContextExt;
use codeq::Decode;

use crate::offset_reader::OffsetReader;
use crate::segment::index::IndexEntry;
use crate::RecordBatch;
use crate::SegmentId;

/// Decode batches one by one from a store file, yielding the location each
/// one occupies.
///
/// The first error stops the iteration: bytes after a damaged batch can not
/// be located.
pub(crate) struct RecordIterator<R> {
    r: OffsetReader<R>,
    total_size: u64,
    segment_id: SegmentId,
    index: u32,
    error: Option<io::Error>,
}

impl<R> RecordIterator<R>
where R: io::Read
{
    pub(crate) fn new(r: R, size: u64, segment_id: SegmentId) -> Self {
        Self {
            r: OffsetReader::new(r, 0),
            total_size: size,
            segment_id,
            index: 0,
            error: None,
        }
    }
}

impl<R> Iterator for RecordIterator<R>
where R: io::Read
{
    type Item = Result<(IndexEntry, RecordBatch), io::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.error.is_some() {
            return None;
        }

        let start = self.r.offset();
        if start == self.total_size {
            return None;
        }

        let res = RecordBatch::decode(&mut self.r)
            .and_then(|batch| {
                let end = self.r.offset();
                let entry = IndexEntry::new(
                    self.index,
                    u32::try_from(start).map_err(io::Error::other)?,
                    u32::try_from(end - start).map_err(io::Error::other)?,
                );
                Ok((entry, batch))
            })
            .context(|| format!("decode RecordBatch at position {}", start))
            .context(|| format!("iterate {}", self.segment_id));

        match &res {
            Ok(_) => self.index += 1,
            Err(e) => self.error = Some(io::Error::new(e.kind(), e.to_string())),
        }

        Some(res)
    }
}
