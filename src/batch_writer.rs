use std::io::{self, Write};

use tracing::{debug, warn};

use crate::config::{OutputFormat, BATCH_SIZE};
use crate::slim_record::{CompactRecord, CSV_HEADER};

/// Destination for filled batches of records.
///
/// Implementations decide what happens with records once a batch is full:
/// write raw bytes to a file, render text, or collect them in memory. The
/// [`BatchWriter`] only buffers; all output goes through this trait.
///
/// # Examples
///
/// ```
/// # use s3slim::batch_writer::RecordSink;
/// # use s3slim::slim_record::CompactRecord;
/// // Counts records instead of writing them
/// struct CountingSink(usize);
///
/// impl RecordSink for CountingSink {
///     fn write_batch(&mut self, records: &[CompactRecord]) -> std::io::Result<()> {
///         self.0 += records.len();
///         Ok(())
///     }
/// }
/// ```
pub trait RecordSink {
    /// Writes a batch of records, in order.
    fn write_batch(&mut self, records: &[CompactRecord]) -> io::Result<()>;

    /// Called once after the final batch. Flushes buffered output.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn write_batch(&mut self, records: &[CompactRecord]) -> io::Result<()> {
        (**self).write_batch(records)
    }

    fn finish(&mut self) -> io::Result<()> {
        (**self).finish()
    }
}

/// Writes records in the 28-byte wire format, one after another.
pub struct BinarySink<W: Write> {
    out: W,
}

impl<W: Write> BinarySink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RecordSink for BinarySink<W> {
    fn write_batch(&mut self, records: &[CompactRecord]) -> io::Result<()> {
        for record in records {
            record.write_to(&mut self.out)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Writes records as comma-separated text with a single header line.
pub struct CsvSink<W: Write> {
    out: W,
    header_written: bool,
}

impl<W: Write> CsvSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            header_written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_header(&mut self) -> io::Result<()> {
        if !self.header_written {
            writeln!(self.out, "{CSV_HEADER}")?;
            self.header_written = true;
        }
        Ok(())
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn write_batch(&mut self, records: &[CompactRecord]) -> io::Result<()> {
        self.write_header()?;
        for record in records {
            writeln!(self.out, "{record}")?;
        }
        Ok(())
    }

    /// An empty run still produces the header.
    fn finish(&mut self) -> io::Result<()> {
        self.write_header()?;
        self.out.flush()
    }
}

/// Picks the sink matching `format`.
pub fn sink_for<'a, W: Write + 'a>(format: OutputFormat, out: W) -> Box<dyn RecordSink + 'a> {
    match format {
        OutputFormat::Binary => Box::new(BinarySink::new(out)),
        OutputFormat::Csv => Box::new(CsvSink::new(out)),
    }
}

/// Buffers compacted records and hands them to a [`RecordSink`] in batches.
///
/// Records are appended to an in-memory batch. When the batch reaches its
/// capacity it is passed to the sink and the buffer is reused. Batching only
/// amortises I/O; batch boundaries are not visible in the output.
///
/// Call [`finish`](BatchWriter::finish) to write the last partial batch and
/// flush the sink. A writer that is dropped without `finish` still tries to
/// write its pending records, but any error is only logged.
///
/// A batch is handed to the sink at most once. If the sink fails, part of the
/// batch may already be written, so the writer is poisoned: the batch is
/// discarded and every later write fails instead of repeating records.
///
/// # Examples
///
/// ```
/// # use s3slim::batch_writer::{BatchWriter, BinarySink};
/// # use s3slim::slim_record::{CompactRecord, RECORD_SIZE};
/// let mut writer = BatchWriter::with_capacity(BinarySink::new(Vec::new()), 2);
/// for _ in 0..3 {
///     writer.push(CompactRecord::default()).unwrap();
/// }
/// let sink = writer.finish().unwrap();
/// assert_eq!(sink.into_inner().len(), 3 * RECORD_SIZE);
/// ```
pub struct BatchWriter<S: RecordSink> {
    batch: Vec<CompactRecord>,
    capacity: usize,
    sink: Option<S>,
    records_written: u64,
    batches_flushed: u64,
    poisoned: bool,
}

impl<S: RecordSink> BatchWriter<S> {
    /// Creates a writer with the default batch size of [`BATCH_SIZE`].
    pub fn new(sink: S) -> Self {
        Self::with_capacity(sink, BATCH_SIZE)
    }

    /// Creates a writer that flushes every `capacity` records.
    ///
    /// A capacity of zero is treated as one.
    pub fn with_capacity(sink: S, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            batch: Vec::with_capacity(capacity),
            capacity,
            sink: Some(sink),
            records_written: 0,
            batches_flushed: 0,
            poisoned: false,
        }
    }

    /// Appends a record, flushing first if the batch is full.
    pub fn push(&mut self, record: CompactRecord) -> io::Result<()> {
        if self.batch.len() >= self.capacity {
            self.flush()?;
        }
        self.batch.push(record);
        if self.batch.len() >= self.capacity {
            self.flush()?;
        }
        Ok(())
    }

    /// Hands the current batch to the sink, even if it is not full.
    pub fn flush(&mut self) -> io::Result<()> {
        if self.poisoned {
            return Err(io::Error::other("batch writer poisoned by an earlier sink error"));
        }
        if self.batch.is_empty() {
            return Ok(());
        }
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };

        if let Err(error) = sink.write_batch(&self.batch) {
            self.poisoned = true;
            warn!(%error, discarded = self.batch.len(), "Sink failed mid-batch");
            self.batch.clear();
            return Err(error);
        }
        self.records_written += self.batch.len() as u64;
        self.batches_flushed += 1;
        debug!(records = self.batch.len(), batch = self.batches_flushed, "Batch flushed");
        self.batch.clear();
        Ok(())
    }

    /// Writes the pending batch, finishes the sink and returns it.
    pub fn finish(mut self) -> io::Result<S> {
        self.flush()?;
        let mut sink = self
            .sink
            .take()
            .ok_or_else(|| io::Error::other("batch writer already finished"))?;
        sink.finish()?;
        Ok(sink)
    }

    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn batches_flushed(&self) -> u64 {
        self.batches_flushed
    }

    /// True once the sink has failed; nothing more will be written.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }
}

impl<S: RecordSink> Drop for BatchWriter<S> {
    fn drop(&mut self) {
        if self.poisoned || self.sink.is_none() || self.batch.is_empty() {
            return;
        }
        if let Err(error) = self.flush() {
            warn!(%error, pending = self.batch.len(), "Dropping unwritten records");
        } else if let Some(sink) = self.sink.as_mut() {
            if let Err(error) = sink.finish() {
                warn!(%error, "Failed to finish sink");
            }
        }
    }
}
