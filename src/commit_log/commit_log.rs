use std::io;
use std::sync::Arc;

use codeq::error_context_ext::ErrorContextExt;
use log::debug;
use log::error;
use log::info;
use log::warn;
use parking_lot::RwLock;

use crate::api::commit_log_api::CommitLogApi;
use crate::commit_log::dump::Dump;
use crate::commit_log::stat::SegmentStat;
use crate::commit_log::stat::Stat;
use crate::config::SegmentFile;
use crate::errors::CorruptedBatch;
use crate::errors::LogError;
use crate::errors::OffsetOutOfRange;
use crate::file_lock::FileLock;
use crate::num::format_pad_u64;
use crate::segment::Segment;
use crate::Config;
use crate::RecordBatch;
use crate::SegmentId;

/// An append-only log of [`RecordBatch`]es addressed by offset.
///
/// The offset space is split into segments. Only the last one, the active
/// segment, accepts appends; when it is full a new one is created starting at
/// the next offset.
///
/// All methods take `&self`: a `CommitLog` can be shared between threads with
/// an `Arc`. Appends are serialized; reads run concurrently with each other.
#[derive(Debug)]
pub struct CommitLog {
    pub(crate) config: Arc<Config>,

    /// Acquire the dir exclusive lock when writing to the log.
    _dir_lock: FileLock,

    /// Segments ordered by base offset. The last one is the active segment.
    ///
    /// Lock order: this lock is acquired before any segment lock.
    segments: RwLock<Vec<Arc<Segment>>>,
}

impl CommitLogApi for CommitLog {
    fn append_batch(&self, batch: &RecordBatch) -> Result<u64, LogError> {
        CommitLog::append_batch(self, batch)
    }

    fn read_batch(&self, offset: u64) -> Result<RecordBatch, LogError> {
        CommitLog::read_batch(self, offset)
    }
}

impl CommitLog {
    /// Opens a CommitLog at the configured directory.
    ///
    /// This operation:
    /// 1. Acquires an exclusive lock on the directory
    /// 2. Opens existing segments in order, recovering their state
    /// 3. Re-activates the last segment, or creates the first one
    ///
    /// # Errors
    /// Returns an error if:
    /// - The config is invalid
    /// - Directory operations fail
    /// - Two segments have overlapping offset ranges
    pub fn open(config: Arc<Config>) -> Result<Self, io::Error> {
        config.validate()?;

        std::fs::create_dir_all(&config.dir)
            .context(|| format!("create dir '{}'", config.dir))?;

        let dir_lock = FileLock::new(config.clone())
            .context(|| format!("open CommitLog in '{}'", config.dir))?;

        let segment_ids = Self::load_segment_ids(&config)?;

        let mut segments: Vec<Arc<Segment>> = Vec::new();

        for segment_id in segment_ids {
            let segment = Segment::open(config.clone(), segment_id.base_offset())?;

            if let Some(prev) = segments.last() {
                Self::ensure_non_overlapping(prev, &segment)?;
            }

            segments.push(Arc::new(segment));
        }

        if let Some(last) = segments.last() {
            last.activate()?;
        } else {
            let first = Segment::create(config.clone(), config.initial_offset())?;
            segments.push(Arc::new(first));
        }

        let log = Self {
            config,
            _dir_lock: dir_lock,
            segments: RwLock::new(segments),
        };

        {
            let segments = log.segments.read();
            let (lowest, next) = Self::offset_range(&segments);
            info!(
                "CommitLog opened in '{}': offsets [{}, {}), {} segments",
                log.config.dir,
                lowest,
                next,
                segments.len()
            );
        }

        Ok(log)
    }

    /// Verifies that `next` starts after every offset `prev` holds.
    ///
    /// A gap between two segments is allowed: it is left by removing a
    /// segment in the middle.
    fn ensure_non_overlapping(
        prev: &Segment,
        next: &Segment,
    ) -> Result<(), io::Error> {
        let prev_end = prev.next_offset();
        let next_start = next.base_offset();

        if prev_end > next_start {
            let message = format!(
                "Overlapping segments: {} ends at {}, {} starts at {}; \
                    Can not open, fix this error and re-open",
                prev.segment_id(),
                format_pad_u64(prev_end),
                next.segment_id(),
                format_pad_u64(next_start),
            );
            return Err(io::Error::new(io::ErrorKind::InvalidData, message));
        }

        if prev_end < next_start {
            warn!(
                "Gap between segments: [{}, {}) is missing",
                prev_end, next_start
            );
        }

        Ok(())
    }

    /// Returns the ids of all segments in the directory, in ascending order.
    ///
    /// A segment is identified by its store file. An index file without a
    /// store file holds no data and is ignored; it is replaced when a segment
    /// is created at that base offset.
    pub fn load_segment_ids(
        config: &Config,
    ) -> Result<Vec<SegmentId>, io::Error> {
        let entries = std::fs::read_dir(&config.dir)?;
        let mut segment_ids = vec![];

        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();

            let fn_str = file_name.to_string_lossy();
            if fn_str == FileLock::LOCK_FILE_NAME {
                continue;
            }

            match Config::parse_segment_file_name(&fn_str) {
                Ok((base_offset, SegmentFile::Store)) => {
                    segment_ids.push(SegmentId(base_offset));
                }
                Ok((base_offset, SegmentFile::Index)) => {
                    let store = config.store_path(base_offset);
                    if !std::path::Path::new(&store).exists() {
                        warn!(
                            "Ignore index file without store: '{}'",
                            fn_str
                        );
                    }
                }
                Err(err) => {
                    warn!("Ignore invalid file name: '{}': {}", fn_str, err);
                }
            }
        }

        segment_ids.sort();

        Ok(segment_ids)
    }

    /// Get a reference to the CommitLog configuration.
    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    /// Append a batch and return the offset assigned to it.
    ///
    /// The batch is marshalled before taking the log lock. If the active
    /// segment is full after the append, a new segment is created starting at
    /// the next offset.
    pub fn append_batch(&self, batch: &RecordBatch) -> Result<u64, LogError> {
        let bytes = batch.marshal()?;

        let mut segments = self.segments.write();

        // A previous roll over may have failed, or the last segment was
        // already full when opened.
        if Self::active(&segments).is_maxed() {
            self.roll_over(&mut segments)?;
        }

        let offset = Self::active(&segments).append(&bytes)?;

        if Self::active(&segments).is_maxed() {
            if let Err(e) = self.roll_over(&mut segments) {
                // The batch is durable and has an offset; roll over is
                // retried by the next append.
                error!(
                    "Failed to roll over after appending offset {}: {}",
                    offset, e
                );
            }
        }

        Ok(offset)
    }

    /// Read the batch stored at `offset`.
    ///
    /// Returns [`OffsetOutOfRange`] if no segment holds this offset: it is
    /// below the lowest offset, not yet assigned, or in a removed segment.
    pub fn read_batch(&self, offset: u64) -> Result<RecordBatch, LogError> {
        let segment = {
            let segments = self.segments.read();
            Self::find_segment(&segments, offset)
                .ok_or_else(|| OffsetOutOfRange::new(offset))?
        };

        let bytes = segment.read(offset)?;

        let batch = RecordBatch::unmarshal(&bytes)
            .map_err(|e| CorruptedBatch::new(offset, e))?;

        debug!("Read offset {} from {}", offset, segment.segment_id());

        Ok(batch)
    }

    /// Binary search for the segment whose range contains `offset`.
    fn find_segment(
        segments: &[Arc<Segment>],
        offset: u64,
    ) -> Option<Arc<Segment>> {
        // Number of segments starting at or before `offset`
        let n = segments.partition_point(|s| s.base_offset() <= offset);
        if n == 0 {
            return None;
        }

        let segment = &segments[n - 1];
        if offset < segment.next_offset() {
            Some(segment.clone())
        } else {
            None
        }
    }

    fn active(segments: &[Arc<Segment>]) -> &Arc<Segment> {
        // There is always at least one segment: `open` creates one if the
        // directory is empty and the active one is never removed.
        &segments[segments.len() - 1]
    }

    /// Seal the active segment and push a new active segment starting at the
    /// next offset.
    fn roll_over(&self, segments: &mut Vec<Arc<Segment>>) -> Result<(), io::Error> {
        let active = Self::active(segments).clone();
        let next_offset = active.next_offset();

        info!(
            "Closing full segment: {}, open new: {}",
            active.segment_id(),
            SegmentId(next_offset)
        );

        active.close()?;
        let new_segment = Segment::create(self.config.clone(), next_offset)?;

        segments.push(Arc::new(new_segment));
        Ok(())
    }

    /// The lowest offset stored in the log.
    ///
    /// Equal to [`Self::next_offset`] if the log holds no batch.
    pub fn lowest_offset(&self) -> u64 {
        let segments = self.segments.read();
        segments[0].base_offset()
    }

    /// The offset the next appended batch will be assigned.
    pub fn next_offset(&self) -> u64 {
        let segments = self.segments.read();
        Self::active(&segments).next_offset()
    }

    /// The offset of the last appended batch, or `None` if no batch is stored.
    pub fn highest_offset(&self) -> Option<u64> {
        let (lowest, next) = Self::offset_range(&self.segments.read());

        if next > lowest {
            Some(next - 1)
        } else {
            None
        }
    }

    /// Returns `(lowest_offset, next_offset)` seen under one lock guard.
    fn offset_range(segments: &[Arc<Segment>]) -> (u64, u64) {
        (segments[0].base_offset(), Self::active(segments).next_offset())
    }

    /// Remove every sealed segment in which all offsets are below `lowest`.
    ///
    /// The active segment is never removed. Returns the ids of the removed
    /// segments.
    pub fn truncate(&self, lowest: u64) -> Result<Vec<SegmentId>, io::Error> {
        let mut segments = self.segments.write();

        info!("CommitLog truncate below: {}", lowest);

        let mut removed = vec![];

        while segments.len() > 1 {
            let first = &segments[0];
            if first.next_offset() > lowest {
                break;
            }

            first.remove()?;
            removed.push(first.segment_id());
            segments.remove(0);
        }

        Ok(removed)
    }

    /// Remove one sealed segment.
    ///
    /// Removing a segment other than the first leaves a gap: reading an offset
    /// in it returns [`OffsetOutOfRange`].
    pub fn remove_segment(&self, segment_id: SegmentId) -> Result<(), io::Error> {
        let mut segments = self.segments.write();

        let i = segments
            .binary_search_by_key(&segment_id.base_offset(), |s| s.base_offset())
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} not found", segment_id),
                )
            })?;

        if i == segments.len() - 1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is the active segment, can not remove", segment_id),
            ));
        }

        segments[i].remove()?;
        segments.remove(i);
        Ok(())
    }

    /// Flush data of the active segment to disk.
    pub fn sync(&self) -> Result<(), io::Error> {
        let segments = self.segments.read();
        Self::active(&segments).sync()
    }

    /// Seal every segment and release the directory lock.
    ///
    /// Dropping a `CommitLog` without calling `close` is safe: index files
    /// are trimmed when dropped, and an untrimmed index file is recovered on
    /// the next open.
    pub fn close(self) -> Result<(), io::Error> {
        {
            let segments = self.segments.read();
            for segment in segments.iter() {
                segment.close()?;
            }
        }

        info!("CommitLog closed in '{}'", self.config.dir);
        Ok(())
    }

    /// Get statistics about every segment in this log.
    pub fn stat(&self) -> Stat {
        let segments = self.segments.read();

        // After a failed roll over the last segment is sealed: no segment is
        // active until the next append creates one.
        let segment_stats = segments
            .iter()
            .map(|s| SegmentStat {
                segment_id: s.segment_id(),
                records_count: s.records_count(),
                base_offset: s.base_offset(),
                next_offset: s.next_offset(),
                size: s.size(),
                active: !s.is_sealed(),
            })
            .collect();

        Stat {
            segments: segment_stats,
        }
    }

    /// Dump the store files of this log for debugging purposes.
    pub fn dump(&self) -> Dump {
        Dump::new(self.config.clone())
    }
}
