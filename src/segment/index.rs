//! The index of a segment: a table of fixed width entries, one per batch,
//! mapping a relative offset to the location of the batch in the store file.
//!
//! Entry `i` is stored at byte `i * 12` of the index file:
//!
//! ```text
//! | offset: u32 | position: u32 | length: u32 |
//! ```
//!
//! All fields are big-endian. The file is pre-allocated to its capacity while
//! the segment is active, and trimmed to the written entries when the segment
//! is sealed.

use std::fs::OpenOptions;
use std::io;

use byteorder::BigEndian;
use byteorder::ByteOrder;
use codeq::error_context_ext::ErrorContextExt;
use log::warn;

use crate::segment::mmap_buf::MmapBuf;

pub(crate) const OFFSET_WIDTH: u64 = 4;
pub(crate) const POSITION_WIDTH: u64 = 4;
pub(crate) const LENGTH_WIDTH: u64 = 4;
pub(crate) const ENTRY_WIDTH: u64 = OFFSET_WIDTH + POSITION_WIDTH + LENGTH_WIDTH;

/// Location of one batch in a store file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Offset relative to the segment's base offset.
    pub offset: u32,
    /// Byte position of the batch in the store file.
    pub position: u32,
    /// Size of the batch in bytes.
    pub length: u32,
}

impl IndexEntry {
    pub fn new(offset: u32, position: u32, length: u32) -> Self {
        Self {
            offset,
            position,
            length,
        }
    }

    /// The position right after this batch.
    pub fn end(&self) -> u64 {
        self.position as u64 + self.length as u64
    }

    pub(crate) fn to_bytes(self) -> [u8; ENTRY_WIDTH as usize] {
        let mut b = [0u8; ENTRY_WIDTH as usize];
        BigEndian::write_u32(&mut b[0..4], self.offset);
        BigEndian::write_u32(&mut b[4..8], self.position);
        BigEndian::write_u32(&mut b[8..12], self.length);
        b
    }

    pub(crate) fn from_bytes(b: [u8; ENTRY_WIDTH as usize]) -> Self {
        Self {
            offset: BigEndian::read_u32(&b[0..4]),
            position: BigEndian::read_u32(&b[4..8]),
            length: BigEndian::read_u32(&b[8..12]),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Index {
    path: String,

    buf: MmapBuf,

    /// Number of bytes holding written entries; the write cursor.
    size: u64,
}

impl Index {
    /// Create a new empty index file pre-allocated to `capacity` bytes.
    pub(crate) fn create(path: &str, capacity: u64) -> Result<Self, io::Error> {
        let f = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .context(|| format!("create index {}", path))?;

        let mut buf = MmapBuf::open(f)?;
        buf.resize(capacity)?;

        Ok(Self {
            path: path.to_string(),
            buf,
            size: 0,
        })
    }

    /// Open an existing index file and find out how many entries are written.
    ///
    /// The file may be longer than its content: it is pre-allocated while
    /// active, and not trimmed if the process did not close it. Entries are
    /// read until the first one that is not a valid successor of the previous
    /// one, or that refers to bytes beyond `store_len`.
    pub(crate) fn open(path: &str, store_len: u64) -> Result<Self, io::Error> {
        let f = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .context(|| format!("open index {}", path))?;

        let buf = MmapBuf::open(f)?;

        let mut index = Self {
            path: path.to_string(),
            buf,
            size: 0,
        };

        let file_len = index.buf.len();
        let mut prev_end = 0u64;

        while index.size + ENTRY_WIDTH <= file_len {
            let entry = index.entry_at(index.size)?;
            let want_offset = index.size / ENTRY_WIDTH;

            let valid = entry.offset as u64 == want_offset
                && entry.position as u64 == prev_end
                && entry.length > 0
                && entry.end() <= store_len;

            if !valid {
                break;
            }

            prev_end = entry.end();
            index.size += ENTRY_WIDTH;
        }

        if file_len % ENTRY_WIDTH != 0 {
            warn!(
                "Index {} has a partial entry: file size {} is not a multiple of {}",
                path, file_len, ENTRY_WIDTH
            );
        }

        Ok(index)
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    /// Number of written entries.
    pub(crate) fn entries_count(&self) -> u64 {
        self.size / ENTRY_WIDTH
    }

    /// The last written entry, if any.
    pub(crate) fn last_entry(&self) -> Result<Option<IndexEntry>, io::Error> {
        if self.size == 0 {
            return Ok(None);
        }
        let entry = self.entry_at(self.size - ENTRY_WIDTH)?;
        Ok(Some(entry))
    }

    /// Append an entry at the write cursor.
    ///
    /// Fails if the pre-allocated region is full; the cursor is not moved.
    pub(crate) fn write_entry(
        &mut self,
        entry: &IndexEntry,
    ) -> Result<(), io::Error> {
        self.buf
            .write_fixed(self.size, &entry.to_bytes())
            .map_err(|e| {
                io::Error::new(
                    io::ErrorKind::Other,
                    format!(
                        "Index {} is full, can not write {:?}: {}",
                        self.path, entry, e
                    ),
                )
            })?;

        self.size += ENTRY_WIDTH;
        Ok(())
    }

    /// Read the entry of the batch at `relative_offset`.
    ///
    /// Returns `None` if no such entry is written.
    pub(crate) fn read_entry(
        &self,
        relative_offset: u64,
    ) -> Result<Option<IndexEntry>, io::Error> {
        let Some(pos) = relative_offset.checked_mul(ENTRY_WIDTH) else {
            return Ok(None);
        };

        if pos + ENTRY_WIDTH > self.size {
            return Ok(None);
        }

        let entry = self.entry_at(pos)?;

        if entry.offset as u64 != relative_offset {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Index {} entry at {} has offset {}, expect {}",
                    self.path, pos, entry.offset, relative_offset
                ),
            ));
        }

        Ok(Some(entry))
    }

    fn entry_at(&self, pos: u64) -> Result<IndexEntry, io::Error> {
        let b = self.buf.read_fixed::<{ ENTRY_WIDTH as usize }>(pos)?;
        Ok(IndexEntry::from_bytes(b))
    }

    /// Make room for `capacity` bytes of entries, for a segment that becomes
    /// active again after being reopened.
    pub(crate) fn grow(&mut self, capacity: u64) -> Result<(), io::Error> {
        if capacity > self.buf.len() {
            self.buf.resize(capacity)?;
        }
        Ok(())
    }

    /// Trim the file to the written entries and write them back to disk.
    pub(crate) fn seal(&mut self) -> Result<(), io::Error> {
        self.buf.flush()?;
        self.buf.resize(self.size)
    }

    /// Write dirty entries back to disk without trimming.
    pub(crate) fn flush(&self) -> Result<(), io::Error> {
        self.buf.flush()
    }
}

impl Drop for Index {
    fn drop(&mut self) {
        if let Err(e) = self.seal() {
            warn!("Failed to trim index {} on drop: {}", self.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use pretty_assertions::assert_eq;

    use super::Index;
    use super::IndexEntry;

    #[test]
    fn test_index_entry_bytes() {
        let e = IndexEntry::new(1, 0x0102_0304, 16);
        assert_eq!(
            [
                0, 0, 0, 1, // offset
                1, 2, 3, 4, // position
                0, 0, 0, 16, // length
            ],
            e.to_bytes()
        );
        assert_eq!(e, IndexEntry::from_bytes(e.to_bytes()));
        assert_eq!(0x0102_0304 + 16, e.end());
    }

    #[test]
    fn test_write_read_entry() -> Result<(), io::Error> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("x.index").to_str().unwrap().to_string();

        let mut index = Index::create(&path, 36)?;
        assert_eq!(36, std::fs::metadata(&path)?.len());
        assert_eq!(None, index.read_entry(0)?);
        assert_eq!(None, index.last_entry()?);

        index.write_entry(&IndexEntry::new(0, 0, 10))?;
        index.write_entry(&IndexEntry::new(1, 10, 20))?;

        assert_eq!(2, index.entries_count());
        assert_eq!(Some(IndexEntry::new(0, 0, 10)), index.read_entry(0)?);
        assert_eq!(Some(IndexEntry::new(1, 10, 20)), index.read_entry(1)?);
        assert_eq!(None, index.read_entry(2)?);
        assert_eq!(None, index.read_entry(u64::MAX)?);
        assert_eq!(Some(IndexEntry::new(1, 10, 20)), index.last_entry()?);

        index.write_entry(&IndexEntry::new(2, 30, 5))?;
        let err = index.write_entry(&IndexEntry::new(3, 35, 5)).unwrap_err();
        assert_eq!(io::ErrorKind::Other, err.kind());
        assert_eq!(3, index.entries_count());

        index.seal()?;
        assert_eq!(36, std::fs::metadata(&path)?.len());

        Ok(())
    }

    #[test]
    fn test_seal_on_drop() -> Result<(), io::Error> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("x.index").to_str().unwrap().to_string();

        {
            let mut index = Index::create(&path, 120)?;
            index.write_entry(&IndexEntry::new(0, 0, 10))?;
        }

        let bytes = std::fs::read(&path)?;
        assert_eq!(vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 10], bytes);
        Ok(())
    }

    #[test]
    fn test_open_recovers_size() -> Result<(), io::Error> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("x.index").to_str().unwrap().to_string();

        // Not trimmed: the tail of the file are zeros.
        let mut content = vec![];
        content.extend_from_slice(&IndexEntry::new(0, 0, 10).to_bytes());
        content.extend_from_slice(&IndexEntry::new(1, 10, 20).to_bytes());
        content.extend_from_slice(&IndexEntry::new(2, 30, 5).to_bytes());
        content.extend_from_slice(&[0; 24]);
        std::fs::write(&path, &content)?;

        {
            let index = Index::open(&path, 35)?;
            assert_eq!(3, index.entries_count());
        }

        // Dropped an open index trims the file
        assert_eq!(36, std::fs::metadata(&path)?.len());

        // The store file is shorter than the last entry refers to.
        {
            let index = Index::open(&path, 34)?;
            assert_eq!(2, index.entries_count());
            assert_eq!(Some(IndexEntry::new(1, 10, 20)), index.last_entry()?);
        }

        Ok(())
    }

    #[test]
    fn test_open_stops_at_non_consecutive_entry() -> Result<(), io::Error> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("x.index").to_str().unwrap().to_string();

        let mut content = vec![];
        content.extend_from_slice(&IndexEntry::new(0, 0, 10).to_bytes());
        content.extend_from_slice(&IndexEntry::new(1, 11, 20).to_bytes());
        std::fs::write(&path, &content)?;

        let mut index = Index::open(&path, 100)?;
        assert_eq!(1, index.entries_count());

        index.grow(48)?;
        index.write_entry(&IndexEntry::new(1, 10, 20))?;
        assert_eq!(Some(IndexEntry::new(1, 10, 20)), index.read_entry(1)?);
        Ok(())
    }
}
