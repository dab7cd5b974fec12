use std::io::{self, ErrorKind, Read};

use crate::error::{Result, SlimLogError};
use crate::slim_record::{CompactRecord, RECORD_SIZE};

/// Sequential reader for a stream of encoded [`CompactRecord`]s.
///
/// The stream is a plain concatenation of [`RECORD_SIZE`]-byte records with
/// no header. The reader yields records in stream order. A stream whose
/// length is not a multiple of the record size ends with a
/// [`SlimLogError::TruncatedRecord`] error, after which iteration stops.
///
/// # Examples
///
/// ```
/// # use s3slim::record_reader::RecordReader;
/// # use s3slim::slim_record::CompactRecord;
/// let record = CompactRecord { status_code: 206, flags: 0x03, ..Default::default() };
/// let mut data = Vec::new();
/// record.write_to(&mut data).unwrap();
/// record.write_to(&mut data).unwrap();
///
/// let records: Vec<_> = RecordReader::new(data.as_slice())
///     .collect::<Result<_, _>>()
///     .unwrap();
/// assert_eq!(records, vec![record, record]);
/// ```
pub struct RecordReader<R: Read> {
    input: R,
    offset: u64,
    done: bool,
}

impl<R: Read> RecordReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            offset: 0,
            done: false,
        }
    }

    /// Byte offset of the next record.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reads the next record.
    ///
    /// Returns `Ok(None)` at a clean end of stream.
    pub fn read_record(&mut self) -> Result<Option<CompactRecord>> {
        if self.done {
            return Ok(None);
        }

        let mut buf = [0u8; RECORD_SIZE];
        let filled = match fill(&mut self.input, &mut buf) {
            Ok(filled) => filled,
            Err(error) => {
                self.done = true;
                return Err(error.into());
            }
        };

        if filled == 0 {
            self.done = true;
            return Ok(None);
        }
        if filled < RECORD_SIZE {
            self.done = true;
            return Err(SlimLogError::TruncatedRecord {
                offset: self.offset,
                len: filled,
            });
        }

        self.offset += RECORD_SIZE as u64;
        Ok(Some(CompactRecord::decode(&buf)))
    }

    pub fn into_inner(self) -> R {
        self.input
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<CompactRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

/// Reads until `buf` is full or the stream ends, returning the byte count.
fn fill<R: Read>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
