use std::io;
use std::io::Read;
use std::io::Write;

use byteorder::BigEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;
use codeq::ChecksumReader;
use codeq::config::Crc32fast;
use codeq::ChecksumWriter;

/// A single message in a batch, addressed relative to the batch's first
/// offset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    pub value: Vec<u8>,
    pub offset_delta: u32,
}

impl Record {
    pub fn new(value: impl Into<Vec<u8>>, offset_delta: u32) -> Self {
        Self {
            value: value.into(),
            offset_delta,
        }
    }
}

/// The unit of append and read: a log assigns one offset to a whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordBatch {
    pub first_offset: u64,
    pub records: Vec<Record>,
}

impl RecordBatch {
    const VERSION: u8 = 1;

    /// version + first_offset + record count
    const HEADER_SIZE: usize = 1 + 8 + 4;

    /// offset_delta + value length
    const RECORD_HEADER_SIZE: usize = 4 + 4;

    /// The checksum is a u64 holding a crc32.
    const CHECKSUM_SIZE: usize = 8;

    pub fn new(first_offset: u64, records: Vec<Record>) -> Self {
        Self {
            first_offset,
            records,
        }
    }

    /// Build a batch of records from values, assigning offset deltas 0, 1,
    /// 2...
    pub fn from_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Vec<u8>>,
    {
        let records = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| Record::new(v, i as u32))
            .collect();

        Self {
            first_offset: 0,
            records,
        }
    }

    /// Returns the number of bytes [`codeq::Encode::encode`] writes for this
    /// batch.
    pub fn encoded_size(&self) -> usize {
        let records = self
            .records
            .iter()
            .map(|r| Self::RECORD_HEADER_SIZE + r.value.len())
            .sum::<usize>();

        Self::HEADER_SIZE + records + Self::CHECKSUM_SIZE
    }

    /// Encode this batch into a newly allocated buffer.
    pub fn marshal(&self) -> Result<Vec<u8>, io::Error> {
        let mut buf = Vec::with_capacity(self.encoded_size());
        codeq::Encode::encode(self, &mut buf)?;
        Ok(buf)
    }

    /// Decode a batch that occupies exactly `bytes`.
    ///
    /// Trailing bytes after the checksum are treated as corruption.
    pub fn unmarshal(bytes: &[u8]) -> Result<Self, io::Error> {
        let mut r = bytes;
        let batch: Self = codeq::Decode::decode(&mut r)?;

        if !r.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "{} trailing bytes after RecordBatch of {} bytes",
                    r.len(),
                    bytes.len() - r.len()
                ),
            ));
        }
        Ok(batch)
    }
}

/// Each batch is encoded as:
/// - 1 byte: version
/// - 8 bytes: first offset
/// - 4 bytes: number of records
/// - for every record: 4 bytes offset delta, 4 bytes value length, value
/// - 8 bytes: checksum
impl codeq::Encode for RecordBatch {
    fn encode<W: io::Write>(&self, mut w: W) -> Result<usize, io::Error> {
        let mut n = 0;
        let mut cw = ChecksumWriter::<Crc32fast, _>::new(&mut w);

        cw.write_u8(Self::VERSION)?;
        cw.write_u64::<BigEndian>(self.first_offset)?;
        cw.write_u32::<BigEndian>(u32_len(self.records.len(), "records")?)?;
        n += Self::HEADER_SIZE;

        for rec in self.records.iter() {
            cw.write_u32::<BigEndian>(rec.offset_delta)?;
            cw.write_u32::<BigEndian>(u32_len(rec.value.len(), "value")?)?;
            cw.write_all(&rec.value)?;
            n += Self::RECORD_HEADER_SIZE + rec.value.len();
        }

        n += cw.write_checksum()?;

        Ok(n)
    }
}

impl codeq::Decode for RecordBatch {
    fn decode<R: io::Read>(r: R) -> Result<Self, io::Error> {
        let mut cr = ChecksumReader::<Crc32fast, _>::new(r);

        let version = cr.read_u8()?;
        if version != Self::VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unsupported RecordBatch version: {}", version),
            ));
        }

        let first_offset = cr.read_u64::<BigEndian>()?;
        let count = cr.read_u32::<BigEndian>()?;

        // Do not trust `count` for pre-allocation: it may be garbage.
        let mut records = Vec::new();

        for _ in 0..count {
            let offset_delta = cr.read_u32::<BigEndian>()?;
            let len = cr.read_u32::<BigEndian>()? as u64;

            let mut value = Vec::new();
            (&mut cr).take(len).read_to_end(&mut value)?;

            if value.len() as u64 != len {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "Record value is truncated: expect {} bytes, got {}",
                        len,
                        value.len()
                    ),
                ));
            }

            records.push(Record {
                value,
                offset_delta,
            });
        }

        cr.verify_checksum(|| "RecordBatch::decode()")?;

        Ok(Self {
            first_offset,
            records,
        })
    }
}

fn u32_len(len: usize, what: &str) -> Result<u32, io::Error> {
    u32::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Too many bytes in {}: {}", what, len),
        )
    })
}
