use std::fmt;
use std::fmt::Formatter;

use crate::num::format_pad9_u64;
use crate::SegmentId;

/// Statistics about a commit log: one entry per segment, in offset order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// The last one is the active segment.
    pub segments: Vec<SegmentStat>,
}

impl Stat {
    /// Total number of batches stored in all segments.
    pub fn records_count(&self) -> u64 {
        self.segments.iter().map(|s| s.records_count).sum()
    }

    /// Total size of all store files in bytes.
    pub fn size(&self) -> u64 {
        self.segments.iter().map(|s| s.size).sum()
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let lb = if f.alternate() { "\n" } else { "" };
        let idt = if f.alternate() { "  " } else { "" };
        write!(
            f,
            "Stat{{{lb} segments: [{lb}{idt}{}{lb} ]{lb}}}",
            self.segments
                .iter()
                .map(|c| format!("{}", c))
                .collect::<Vec<String>>()
                .join(&format!(",{lb}{idt}")),
        )
    }
}

/// Statistics about a single segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentStat {
    pub segment_id: SegmentId,
    /// Number of batches stored in this segment
    pub records_count: u64,
    /// Offset of the first batch in this segment
    pub base_offset: u64,
    /// Offset of the last batch in this segment plus one
    pub next_offset: u64,
    /// Size of the store file in bytes
    pub size: u64,
    /// Whether this segment accepts appends
    pub active: bool,
}

impl fmt::Display for SegmentStat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SegmentStat({}){{records: {}, [{}, {}), size: {}{}}}",
            self.segment_id,
            self.records_count,
            format_pad9_u64(self.base_offset),
            format_pad9_u64(self.next_offset),
            format_pad9_u64(self.size),
            if self.active { ", active" } else { "" },
        )
    }
}
