use std::fs::File;
use std::io;

use memmap2::MmapMut;

/// A file mapped into memory as a resizable byte region.
///
/// Every access is bounds checked against the current length and reported as
/// an `io::Error`; callers never see the mapping itself.
#[derive(Debug)]
pub(crate) struct MmapBuf {
    file: File,

    /// `None` when the file is empty: a zero length region is not mapped.
    mmap: Option<MmapMut>,

    /// Length of the mapped region. Always 0 when `mmap` is `None`.
    len: u64,
}

impl MmapBuf {
    /// Map the entire `file`.
    pub(crate) fn open(file: File) -> Result<Self, io::Error> {
        let len = file.metadata()?.len();
        let mmap = Self::map(&file, len)?;
        Ok(Self { file, mmap, len })
    }

    fn map(file: &File, len: u64) -> Result<Option<MmapMut>, io::Error> {
        if len == 0 {
            return Ok(None);
        }

        // SAFETY: the storage directory is locked by the owning log and the
        // file is never modified except through this mapping or `set_len`,
        // which is only called after the mapping is dropped.
        let mmap = unsafe { MmapMut::map_mut(file)? };
        Ok(Some(mmap))
    }

    pub(crate) fn len(&self) -> u64 {
        self.len
    }

    /// Change the size of the underlying file and remap it.
    ///
    /// Growing fills the new region with zeros.
    ///
    /// If the file can not be resized, the file is mapped again at whatever
    /// size it has. If it can not be mapped, the region becomes empty and
    /// every access fails.
    pub(crate) fn resize(&mut self, new_len: u64) -> Result<(), io::Error> {
        if new_len == self.len {
            return Ok(());
        }

        self.flush()?;
        self.mmap = None;
        self.len = 0;

        let resized = self.file.set_len(new_len);

        let file_len = self.file.metadata()?.len();
        self.mmap = Self::map(&self.file, file_len)?;
        self.len = file_len;

        resized
    }

    /// Copy `N` bytes starting at `at` out of the region.
    pub(crate) fn read_fixed<const N: usize>(
        &self,
        at: u64,
    ) -> Result<[u8; N], io::Error> {
        let range = self.checked_range(at, N)?;

        let mut buf = [0u8; N];
        if range.is_empty() {
            return Ok(buf);
        }

        let Some(mmap) = &self.mmap else {
            return Err(Self::unmapped(at, N));
        };
        buf.copy_from_slice(&mmap[range]);
        Ok(buf)
    }

    /// Copy `bytes` into the region starting at `at`.
    ///
    /// The region does not grow implicitly: writing past the end is an error.
    pub(crate) fn write_fixed(
        &mut self,
        at: u64,
        bytes: &[u8],
    ) -> Result<(), io::Error> {
        let range = self.checked_range(at, bytes.len())?;
        if range.is_empty() {
            return Ok(());
        }

        let Some(mmap) = &mut self.mmap else {
            return Err(Self::unmapped(at, bytes.len()));
        };
        mmap[range].copy_from_slice(bytes);
        Ok(())
    }

    fn unmapped(at: u64, size: usize) -> io::Error {
        io::Error::new(
            io::ErrorKind::Other,
            format!("Access [{}, +{}) to a region that is not mapped", at, size),
        )
    }

    fn checked_range(
        &self,
        at: u64,
        size: usize,
    ) -> Result<std::ops::Range<usize>, io::Error> {
        let end = at.checked_add(size as u64);

        match end {
            Some(end) if end <= self.len => {
                Ok(at as usize..end as usize)
            }
            _ => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "Access [{}, +{}) is out of mapped region of {} bytes",
                    at, size, self.len
                ),
            )),
        }
    }

    /// Write dirty pages back to the file.
    pub(crate) fn flush(&self) -> Result<(), io::Error> {
        if let Some(mmap) = &self.mmap {
            mmap.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs::OpenOptions;
    use std::io;

    use super::MmapBuf;

    fn new_buf(
        dir: &tempfile::TempDir,
        len: u64,
    ) -> Result<MmapBuf, io::Error> {
        let f = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(dir.path().join("buf"))?;
        f.set_len(len)?;
        MmapBuf::open(f)
    }

    #[test]
    fn test_read_write_fixed() -> Result<(), io::Error> {
        let dir = tempfile::tempdir()?;
        let mut buf = new_buf(&dir, 8)?;

        buf.write_fixed(2, &[1, 2, 3])?;
        assert_eq!([0, 0, 1, 2], buf.read_fixed::<4>(0)?);
        assert_eq!([3, 0, 0, 0], buf.read_fixed::<4>(4)?);

        let err = buf.write_fixed(6, &[1, 2, 3]).unwrap_err();
        assert_eq!(io::ErrorKind::UnexpectedEof, err.kind());

        let err = buf.read_fixed::<4>(5).unwrap_err();
        assert_eq!(io::ErrorKind::UnexpectedEof, err.kind());

        assert!(buf.read_fixed::<1>(u64::MAX).is_err());
        Ok(())
    }

    #[test]
    fn test_resize() -> Result<(), io::Error> {
        let dir = tempfile::tempdir()?;
        let mut buf = new_buf(&dir, 0)?;

        assert_eq!(0, buf.len());
        assert!(buf.write_fixed(0, &[1]).is_err());
        assert_eq!([0u8; 0], buf.read_fixed::<0>(0)?);

        buf.resize(4)?;
        buf.write_fixed(0, &[9, 8, 7, 6])?;

        buf.resize(2)?;
        assert_eq!(2, buf.len());
        assert_eq!([9, 8], buf.read_fixed::<2>(0)?);
        assert!(buf.read_fixed::<3>(0).is_err());

        buf.resize(4)?;
        assert_eq!([9, 8, 0, 0], buf.read_fixed::<4>(0)?);

        let file_len = std::fs::metadata(dir.path().join("buf"))?.len();
        assert_eq!(4, file_len);
        Ok(())
    }

    #[test]
    fn test_failed_resize_keeps_region_consistent() -> Result<(), io::Error> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("buf"), b"")?;

        // `set_len` fails on a file opened read-only.
        let f = std::fs::File::open(dir.path().join("buf"))?;
        let mut buf = MmapBuf::open(f)?;

        assert!(buf.resize(8).is_err());
        assert_eq!(0, buf.len());
        assert!(buf.write_fixed(0, &[1]).is_err());
        assert!(buf.read_fixed::<1>(0).is_err());
        Ok(())
    }

    #[test]
    fn test_unmapped_region_rejects_access() -> Result<(), io::Error> {
        let dir = tempfile::tempdir()?;
        let buf = new_buf(&dir, 0)?;

        let mut buf = MmapBuf {
            file: buf.file,
            mmap: None,
            len: 8,
        };

        let err = buf.write_fixed(0, &[1, 2]).unwrap_err();
        assert_eq!(io::ErrorKind::Other, err.kind());

        let err = buf.read_fixed::<2>(0).unwrap_err();
        assert_eq!(io::ErrorKind::Other, err.kind());

        assert_eq!([0u8; 0], buf.read_fixed::<0>(0)?);
        buf.write_fixed(0, &[])?;
        Ok(())
    }
}
