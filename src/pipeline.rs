//! Batch driver: raw lines in, compact records out.
//!
//! Lines are read from a [`BufRead`], tokenized, compacted against the
//! run's [`DedupTable`] and written through a [`BatchWriter`]. Output order
//! always equals input order.
//!
//! With more than one worker, each batch of lines is split into contiguous
//! chunks that are tokenized and projected on scoped threads. The chunk
//! results are concatenated in chunk order and the unique-client step runs
//! afterwards on the calling thread, so parallel and sequential runs write
//! identical bytes.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, info, warn};

use crate::batch_writer::{sink_for, BatchWriter, RecordSink};
use crate::compactor::{mark_first_seen, project};
use crate::config::{PipelineConfig, MAX_LINE_LEN, PROGRESS_INTERVAL};
use crate::dedup_table::DedupTable;
use crate::error::Result;
use crate::slim_record::CompactRecord;
use crate::tokenizer::parse_line;

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub lines_read: u64,
    pub blank_lines: u64,
    pub records_written: u64,
    pub batches_flushed: u64,
    pub malformed_times: u64,
    pub overrun_lines: u64,
    /// Lines longer than [`MAX_LINE_LEN`] that were cut short.
    pub truncated_lines: u64,
    pub unique_clients: u64,
    pub stopped_early: bool,
}

/// One parsing run.
///
/// Owns the dedup table for the duration of the run, so separate runs never
/// share first-seen state.
pub struct Pipeline {
    config: PipelineConfig,
    seen: DedupTable,
    stop: Option<Arc<AtomicBool>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let seen = DedupTable::with_capacity(config.dedup_capacity)?;
        Ok(Self {
            config,
            seen,
            stop: None,
        })
    }

    /// Installs a flag that ends the run between batches once set.
    ///
    /// A stopped run still writes every record of the batches it started,
    /// so the output never ends in a partial record.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn dedup_table(&self) -> &DedupTable {
        &self.seen
    }

    fn should_stop(&self) -> bool {
        self.stop.as_ref().is_some_and(|s| s.load(Ordering::Relaxed))
    }

    /// Writes the records to `out` in the configured
    /// [`output_format`](PipelineConfig::output_format).
    pub fn run_to_writer<R: BufRead, W: Write>(&mut self, input: R, out: W) -> Result<PipelineStats> {
        let sink = sink_for(self.config.output_format, out);
        let (_, stats) = self.run(input, sink)?;
        Ok(stats)
    }

    /// Processes every line of `input` and writes the records to `sink`.
    ///
    /// The sink decides the output encoding; `output_format` of the config is
    /// only consulted by [`run_to_writer`](Pipeline::run_to_writer).
    ///
    /// Returns the sink after it has been finished, together with run
    /// statistics. Malformed lines never fail the run; I/O errors and a full
    /// dedup table do.
    pub fn run<R: BufRead, S: RecordSink>(&mut self, mut input: R, sink: S) -> Result<(S, PipelineStats)> {
        let mut writer = BatchWriter::with_capacity(sink, self.config.batch_size);
        let mut stats = PipelineStats::default();
        let mut lines = Vec::with_capacity(self.config.batch_size);

        loop {
            if self.should_stop() {
                stats.stopped_early = true;
                info!(lines = stats.lines_read, "Stop requested, ending run");
                break;
            }

            let before = stats.lines_read;
            let exhausted = read_batch(&mut input, &mut lines, self.config.batch_size, &mut stats)?;
            if !lines.is_empty() {
                let records = self.compact_batch(&lines, &mut stats)?;
                for record in records {
                    writer.push(record)?;
                }
                lines.clear();
            }

            if self.config.verbose && before / PROGRESS_INTERVAL != stats.lines_read / PROGRESS_INTERVAL {
                info!(lines = stats.lines_read, unique = self.seen.len(), "Progress");
            }

            if exhausted {
                break;
            }
        }

        stats.records_written = writer.records_written() + writer.pending() as u64;
        stats.batches_flushed = writer.batches_flushed() + u64::from(writer.pending() > 0);
        let sink = writer.finish()?;

        if stats.malformed_times > 0 || stats.overrun_lines > 0 || stats.truncated_lines > 0 {
            warn!(
                malformed_times = stats.malformed_times,
                overrun_lines = stats.overrun_lines,
                truncated_lines = stats.truncated_lines,
                "Recovered from malformed input"
            );
        }
        info!(
            lines = stats.lines_read,
            records = stats.records_written,
            unique_clients = stats.unique_clients,
            "Lines processed"
        );
        Ok((sink, stats))
    }

    fn compact_batch(&mut self, lines: &[String], stats: &mut PipelineStats) -> Result<Vec<CompactRecord>> {
        let verbose = self.config.verbose;
        let mut records = if self.config.workers > 1 && lines.len() > 1 {
            project_parallel(lines, self.config.workers, verbose)
        } else {
            project_chunk(lines, verbose)
        };

        for (record, flags) in records.iter_mut() {
            stats.record_line(*flags);
            if mark_first_seen(record, &mut self.seen)? {
                stats.unique_clients += 1;
            }
        }
        Ok(records.into_iter().map(|(record, _)| record).collect())
    }
}

/// Per-line diagnostics carried from a worker back to the driver.
#[derive(Debug, Clone, Copy, Default)]
struct LineFlags {
    malformed_time: bool,
    overrun: bool,
}

impl PipelineStats {
    fn record_line(&mut self, flags: LineFlags) {
        if flags.malformed_time {
            self.malformed_times += 1;
        }
        if flags.overrun {
            self.overrun_lines += 1;
        }
    }
}

fn project_chunk(lines: &[String], verbose: bool) -> Vec<(CompactRecord, LineFlags)> {
    lines
        .iter()
        .map(|line| {
            let parsed = parse_line(line);
            if verbose {
                debug!(
                    bucket = parsed.bucket_name,
                    key = parsed.key,
                    fields = parsed.fields,
                    status = parsed.status_code,
                    "Log->Struct"
                );
            }
            let record = project(&parsed);
            if verbose {
                debug!(key_hash = format_args!("{:08x}", record.key_hash), "Full->Slim");
            }
            let flags = LineFlags {
                malformed_time: parsed.malformed_time,
                overrun: parsed.overrun,
            };
            (record, flags)
        })
        .collect()
}

fn project_parallel(lines: &[String], workers: usize, verbose: bool) -> Vec<(CompactRecord, LineFlags)> {
    let chunk_len = lines.len().div_ceil(workers);
    thread::scope(|scope| {
        let handles: Vec<_> = lines
            .chunks(chunk_len)
            .map(|chunk| scope.spawn(move || project_chunk(chunk, verbose)))
            .collect();

        let mut records = Vec::with_capacity(lines.len());
        for handle in handles {
            match handle.join() {
                Ok(chunk) => records.extend(chunk),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        records
    })
}

/// Reads up to `limit` non-blank lines into `lines`.
///
/// Returns `true` once the input is exhausted. Each line is copied into an
/// owned buffer (invalid UTF-8 is replaced) with its terminator removed.
fn read_batch<R: BufRead>(
    input: &mut R,
    lines: &mut Vec<String>,
    limit: usize,
    stats: &mut PipelineStats,
) -> io::Result<bool> {
    let mut raw = Vec::with_capacity(256);
    while lines.len() < limit {
        raw.clear();
        if input.read_until(b'\n', &mut raw)? == 0 {
            return Ok(true);
        }
        stats.lines_read += 1;

        while matches!(raw.last(), Some(b'\n' | b'\r')) {
            raw.pop();
        }
        if raw.len() > MAX_LINE_LEN {
            raw.truncate(MAX_LINE_LEN);
            stats.truncated_lines += 1;
            debug!(line = stats.lines_read, "Line longer than {MAX_LINE_LEN} bytes truncated");
        }
        if raw.iter().all(u8::is_ascii_whitespace) {
            stats.blank_lines += 1;
            continue;
        }
        lines.push(String::from_utf8_lossy(&raw).into_owned());
    }
    Ok(false)
}
