use std::io;

/// A reader that counts the bytes consumed from the inner reader, starting at
/// a given position.
pub(crate) struct OffsetReader<R> {
    inner: R,
    offset: u64,
}

impl<R: io::Read> OffsetReader<R> {
    pub(crate) fn new(inner: R, start: u64) -> Self {
        Self {
            inner,
            offset: start,
        }
    }

    /// The position of the next byte to read.
    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }
}

impl<R: io::Read> io::Read for OffsetReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.offset += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::io::Read;

    use crate::offset_reader::OffsetReader;

    #[test]
    fn test_offset_reader() -> Result<(), io::Error> {
        let data = b"hello world";
        let mut reader = OffsetReader::new(data.as_ref(), 100);
        assert_eq!(reader.offset(), 100);

        let mut buf = [0; 5];
        reader.read_exact(&mut buf)?;
        assert_eq!(reader.offset(), 105);

        let mut rest = vec![];
        reader.read_to_end(&mut rest)?;
        assert_eq!(reader.offset(), 111);
        assert_eq!(b" world".to_vec(), rest);

        Ok(())
    }
}
