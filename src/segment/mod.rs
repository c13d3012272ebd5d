//! A segment stores the batches of a contiguous range of offsets.
//!
//! A segment consists of two files named after its base offset:
//! - a store file: marshalled batches concatenated one after another,
//! - an index file: one fixed width [`IndexEntry`] per batch.
//!
//! Only the last segment of a log is active and accepts appends. The others
//! are sealed: read-only, with their index file trimmed to the written
//! entries.

pub(crate) mod index;
pub(crate) mod mmap_buf;
pub(crate) mod record_iterator;
pub(crate) mod segment_id;

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Arc;

use codeq::error_context_ext::ErrorContextExt;
use log::debug;
use log::info;
use log::warn;
use parking_lot::RwLock;
use record_iterator::RecordIterator;

use crate::errors::LogError;
use crate::errors::OffsetNotFound;
use crate::segment::index::Index;
use crate::segment::index::IndexEntry;
use crate::segment::segment_id::SegmentId;
use crate::Config;
use crate::RecordBatch;

/// The mutable part of a segment, guarded by the segment lock.
#[derive(Debug)]
struct SegmentState {
    store: File,

    /// The offset the next append will be assigned.
    next_offset: u64,

    /// Size of the store file: where the next batch will be written.
    position: u64,

    /// A sealed segment accepts no more appends.
    sealed: bool,
}

/// A contiguous range of offsets `[base_offset, next_offset)` stored in one
/// store file and one index file.
///
/// Lock order: the `state` lock is always acquired before the `index` lock.
#[derive(Debug)]
pub(crate) struct Segment {
    config: Arc<Config>,

    base_offset: u64,

    state: RwLock<SegmentState>,

    /// Readers share it to look up written entries.
    index: RwLock<Index>,
}

impl Segment {
    /// Create a new empty, active segment starting at `base_offset`.
    ///
    /// If the index can not be created, the new store file is removed, so
    /// that creating the segment can be retried.
    pub(crate) fn create(
        config: Arc<Config>,
        base_offset: u64,
    ) -> Result<Self, io::Error> {
        let segment_id = SegmentId(base_offset);

        let store_path = config.store_path(base_offset);
        let store = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&store_path)
            .context(|| format!("create store of {}", segment_id))?;

        let index = match Self::create_index(&config, segment_id) {
            Ok(index) => index,
            Err(e) => {
                drop(store);
                if let Err(rm_err) = std::fs::remove_file(&store_path) {
                    warn!(
                        "Failed to remove store of {} after failing to create its index: {}",
                        segment_id, rm_err
                    );
                }
                return Err(e);
            }
        };

        info!("Created {}", segment_id);

        Ok(Self {
            config,
            base_offset,
            state: RwLock::new(SegmentState {
                store,
                next_offset: base_offset,
                position: 0,
                sealed: false,
            }),
            index: RwLock::new(index),
        })
    }

    /// Create the index of a segment whose store file was just created.
    ///
    /// An index file left at this path has no store file and holds no data;
    /// it is replaced.
    fn create_index(
        config: &Config,
        segment_id: SegmentId,
    ) -> Result<Index, io::Error> {
        let index_path = config.index_path(segment_id.base_offset());

        if Path::new(&index_path).exists() {
            warn!("Remove index without store of {}: '{}'", segment_id, index_path);
            std::fs::remove_file(&index_path)
                .context(|| format!("remove stale index of {}", segment_id))?;
        }

        Index::create(&index_path, config.index_capacity())
    }

    /// Open an existing segment and recover its state from the files.
    ///
    /// The opened segment is sealed; call [`Self::activate`] to append to it.
    ///
    /// Store bytes after the last indexed batch are the remains of an
    /// incomplete append. They are truncated if
    /// [`Config::truncate_incomplete_record`] is enabled, otherwise an
    /// `InvalidData` error is returned.
    ///
    /// If the index file is missing, it is rebuilt from the store file.
    pub(crate) fn open(
        config: Arc<Config>,
        base_offset: u64,
    ) -> Result<Self, io::Error> {
        let segment_id = SegmentId(base_offset);

        let store = OpenOptions::new()
            .read(true)
            .write(true)
            .open(config.store_path(base_offset))
            .context(|| format!("open store of {}", segment_id))?;

        let store_len = store.metadata()?.len();

        let index_path = config.index_path(base_offset);
        let mut index = if Path::new(&index_path).exists() {
            Index::open(&index_path, store_len)?
        } else {
            warn!("Index of {} is missing, rebuild it", segment_id);
            Self::rebuild_index(&config, segment_id, store_len)?
        };

        let end = index.last_entry()?.map(|e| e.end()).unwrap_or_default();

        if store_len > end {
            if !config.truncate_incomplete_record() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "{} has {} bytes not indexed after position {}",
                        segment_id,
                        store_len - end,
                        end
                    ),
                ));
            }

            warn!(
                "Truncate incomplete tail of {}: store size {} -> {}",
                segment_id, store_len, end
            );
            store.set_len(end)?;
            store.sync_all()?;
        }

        index.seal()?;

        let next_offset = base_offset + index.entries_count();

        info!(
            "Opened {}: offsets [{}, {}), size {}",
            segment_id, base_offset, next_offset, end
        );

        Ok(Self {
            config,
            base_offset,
            state: RwLock::new(SegmentState {
                store,
                next_offset,
                position: end,
                sealed: true,
            }),
            index: RwLock::new(index),
        })
    }

    fn rebuild_index(
        config: &Config,
        segment_id: SegmentId,
        store_len: u64,
    ) -> Result<Index, io::Error> {
        let f = File::open(config.store_path(segment_id.base_offset()))?;
        let br = io::BufReader::with_capacity(config.read_buffer_size(), f);

        let mut entries = vec![];
        for res in RecordIterator::new(br, store_len, segment_id) {
            match res {
                Ok((entry, _batch)) => entries.push(entry),
                Err(e) => {
                    warn!("Stop rebuilding index of {}: {}", segment_id, e);
                    break;
                }
            }
        }

        let capacity = config
            .index_capacity()
            .max(entries.len() as u64 * index::ENTRY_WIDTH);

        let mut index =
            Index::create(&config.index_path(segment_id.base_offset()), capacity)?;

        for entry in entries.iter() {
            index.write_entry(entry)?;
        }

        info!(
            "Rebuilt index of {} with {} entries",
            segment_id,
            entries.len()
        );

        Ok(index)
    }

    pub(crate) fn segment_id(&self) -> SegmentId {
        SegmentId(self.base_offset)
    }

    pub(crate) fn base_offset(&self) -> u64 {
        self.base_offset
    }

    /// The offset the next append to this segment will be assigned.
    pub(crate) fn next_offset(&self) -> u64 {
        self.state.read().next_offset
    }

    /// Size of the store file in bytes.
    pub(crate) fn size(&self) -> u64 {
        self.state.read().position
    }

    pub(crate) fn records_count(&self) -> u64 {
        let st = self.state.read();
        st.next_offset - self.base_offset
    }

    pub(crate) fn is_sealed(&self) -> bool {
        self.state.read().sealed
    }

    /// Returns true if this segment reached either the size or the record
    /// count limit, and the log should roll over to a new segment.
    pub(crate) fn is_maxed(&self) -> bool {
        let st = self.state.read();
        st.position >= self.config.segment_max_size()
            || st.next_offset - self.base_offset
                >= self.config.segment_max_records() as u64
    }

    /// Make a sealed segment accept appends again.
    ///
    /// The index file is extended to its full capacity.
    pub(crate) fn activate(&self) -> Result<(), io::Error> {
        let mut st = self.state.write();
        self.index.write().grow(self.config.index_capacity())?;
        st.sealed = false;
        Ok(())
    }

    /// Append one marshalled batch and return the offset assigned to it.
    ///
    /// The batch becomes visible to readers only after both the store write
    /// and the index write succeeded. On failure the segment state is not
    /// changed.
    pub(crate) fn append(&self, bytes: &[u8]) -> Result<u64, io::Error> {
        let mut st = self.state.write();

        if st.sealed {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is sealed, can not append", self.segment_id()),
            ));
        }

        let offset = st.next_offset;
        let position = st.position;

        let entry = self.index_entry(offset, position, bytes.len())?;

        write_all_at(&st.store, bytes, position).context(|| {
            format!("write {} bytes to {}", bytes.len(), self.segment_id())
        })?;

        if let Err(e) = self.index.write().write_entry(&entry) {
            // Nothing refers to the bytes just written: drop them.
            if let Err(trunc_err) = st.store.set_len(position) {
                warn!(
                    "Failed to truncate store of {} to {}: {}",
                    self.segment_id(),
                    position,
                    trunc_err
                );
            }
            return Err(e);
        }

        st.next_offset += 1;
        st.position += bytes.len() as u64;

        debug!(
            "Appended offset {} to {}: [{}, {})",
            offset,
            self.segment_id(),
            position,
            st.position
        );

        Ok(offset)
    }

    /// Build the index entry of a batch, checking that every field fits the
    /// fixed width format.
    fn index_entry(
        &self,
        offset: u64,
        position: u64,
        len: usize,
    ) -> Result<IndexEntry, io::Error> {
        let too_large = |what: &str, v: u64| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "{} of batch at offset {} in {} exceeds u32: {}",
                    what,
                    offset,
                    self.segment_id(),
                    v
                ),
            )
        };

        let rel = offset - self.base_offset;
        let end = position + len as u64;

        let rel = u32::try_from(rel).map_err(|_| too_large("offset", rel))?;
        u32::try_from(end).map_err(|_| too_large("end position", end))?;

        // `position <= end`, both fit in u32
        Ok(IndexEntry::new(rel, position as u32, len as u32))
    }

    /// Read the marshalled batch at absolute `offset`.
    pub(crate) fn read(&self, offset: u64) -> Result<Vec<u8>, LogError> {
        let st = self.state.read();

        let not_found = || OffsetNotFound::new(offset, self.base_offset);

        if offset < self.base_offset || offset >= st.next_offset {
            return Err(not_found().into());
        }

        let entry = self
            .index
            .read()
            .read_entry(offset - self.base_offset)?
            .ok_or_else(not_found)?;

        let mut buf = vec![0u8; entry.length as usize];
        read_exact_at(&st.store, &mut buf, entry.position as u64).context(
            || format!("read offset {} from {}", offset, self.segment_id()),
        )?;

        Ok(buf)
    }

    /// Seal this segment: no more appends, the store is synced and the index
    /// is trimmed to the written entries.
    pub(crate) fn close(&self) -> Result<(), io::Error> {
        let mut st = self.state.write();

        st.store.sync_all()?;
        self.index.write().seal()?;

        if !st.sealed {
            info!("Sealed {}", self.segment_id());
        }
        st.sealed = true;
        Ok(())
    }

    /// Flush store and index to disk without sealing.
    pub(crate) fn sync(&self) -> Result<(), io::Error> {
        let st = self.state.read();
        st.store.sync_data()?;
        self.index.read().flush()
    }

    /// Delete both files of a sealed segment.
    ///
    /// Readers already holding this segment can still read from the open
    /// handles.
    pub(crate) fn remove(&self) -> Result<(), io::Error> {
        if !self.is_sealed() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is active, can not remove", self.segment_id()),
            ));
        }

        self.close()?;

        let index_path = self.index.read().path().to_string();
        std::fs::remove_file(self.config.store_path(self.base_offset))
            .context(|| format!("remove store of {}", self.segment_id()))?;
        std::fs::remove_file(&index_path)
            .context(|| format!("remove index of {}", self.segment_id()))?;

        info!("Removed {}", self.segment_id());
        Ok(())
    }

    /// Iterate over the batches in the store file of a segment, without
    /// opening the segment.
    #[allow(clippy::type_complexity)]
    pub(crate) fn dump(
        config: &Config,
        segment_id: SegmentId,
    ) -> Result<
        impl Iterator<Item = Result<(IndexEntry, RecordBatch), io::Error>>,
        io::Error,
    > {
        let f = File::open(config.store_path(segment_id.base_offset()))
            .context(|| format!("open store of {}", segment_id))?;
        let size = f.metadata()?.len();

        let br = io::BufReader::with_capacity(config.read_buffer_size(), f);
        Ok(RecordIterator::new(br, size, segment_id))
    }
}

#[cfg(unix)]
fn write_all_at(f: &File, buf: &[u8], pos: u64) -> Result<(), io::Error> {
    std::os::unix::fs::FileExt::write_all_at(f, buf, pos)
}

#[cfg(unix)]
fn read_exact_at(f: &File, buf: &mut [u8], pos: u64) -> Result<(), io::Error> {
    std::os::unix::fs::FileExt::read_exact_at(f, buf, pos)
}

#[cfg(windows)]
fn write_all_at(f: &File, mut buf: &[u8], mut pos: u64) -> Result<(), io::Error> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        let n = f.seek_write(buf, pos)?;
        if n == 0 {
            return Err(io::Error::from(io::ErrorKind::WriteZero));
        }
        buf = &buf[n..];
        pos += n as u64;
    }
    Ok(())
}

#[cfg(windows)]
fn read_exact_at(
    f: &File,
    mut buf: &mut [u8],
    mut pos: u64,
) -> Result<(), io::Error> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        let n = f.seek_read(buf, pos)?;
        if n == 0 {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
        }
        buf = &mut buf[n..];
        pos += n as u64;
    }
    Ok(())
}
