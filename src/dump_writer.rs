use std::io;

use crate::num::format_pad9_u64;
use crate::segment::index::IndexEntry;
use crate::RecordBatch;
use crate::SegmentId;

/// Write one batch per line, preceded by the segment id when a segment
/// starts.
pub fn multiline_string<W: io::Write>(
    w: &mut W,
    segment_id: SegmentId,
    res: Result<(IndexEntry, RecordBatch), io::Error>,
) -> Result<(), io::Error> {
    match res {
        Ok((entry, batch)) => {
            if entry.position == 0 {
                writeln!(w, "{}", segment_id)?;
            }
            writeln!(
                w,
                "  R-{:05}: [{}, {}) {}: offset={} records={:?}",
                entry.offset,
                format_pad9_u64(entry.position as u64),
                format_pad9_u64(entry.end()),
                entry.length,
                segment_id.base_offset() + entry.offset as u64,
                batch
                    .records
                    .iter()
                    .map(|r| String::from_utf8_lossy(&r.value))
                    .collect::<Vec<_>>()
            )?;
        }
        Err(io_err) => {
            writeln!(w, "Error: {}", io_err)?;
        }
    }
    Ok(())
}
