use parking_lot::Mutex;
use s3slim::slim_record::{CSV_HEADER, RECORD_SIZE};
use s3slim::{BinarySink, CompactRecord, OutputFormat, Pipeline, PipelineConfig, RecordReader, SlimLogError};
use std::io::{self, BufRead, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Writer whose bytes stay observable after the sink is consumed.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> Vec<u8> {
        self.0.lock().clone()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn log_line(ip: &str, key: &str, status: u16, sent: u64, size: u64, range: Option<(u64, u64)>) -> String {
    let mut line = format!(
        "79a59df900b949e5 bucket1 [03/May/2025:01:02:03 +0000] {ip} - REQ REST.GET.OBJECT {key} \
         \"GET /{key} HTTP/1.1\" {status} - {sent} {size} 70 42 \"-\" \
         \"AppleCoreMedia/1.0.0.16G77 (iPhone; U; CPU OS 12_4 like Mac OS X; en_us)\" \
         v1 HOSTID SigV2 ECDHE-RSA-AES128-GCM-SHA256 AuthHeader host1.example.com TLSv1.2 - false"
    );
    if let Some((start, end)) = range {
        line.push_str(&format!(" \"bytes={start}-{end}\""));
    }
    line
}

fn sample_logs(count: usize) -> String {
    let mut logs = String::new();
    for i in 0..count {
        let ip = format!("203.0.113.{}", i % 13);
        let key = format!("show-{}/episode-{}.mp3", i % 5, i % 11);
        let line = if i % 3 == 0 {
            log_line(&ip, &key, 206, 1_000_000, 20_000_000, Some((0, 999_999)))
        } else if i % 3 == 1 {
            log_line(&ip, &key, 206, 500, 4096, Some((3500, 4095)))
        } else {
            log_line(&ip, &key, 200, 4096, 4096, None)
        };
        logs.push_str(&line);
        logs.push('\n');
    }
    logs
}

fn run_binary(config: PipelineConfig, input: &str) -> Vec<u8> {
    let buffer = SharedBuffer::default();
    let mut pipeline = Pipeline::new(config).unwrap();
    pipeline.run(input.as_bytes(), BinarySink::new(buffer.clone())).unwrap();
    buffer.contents()
}

fn decode_all(bytes: &[u8]) -> Vec<CompactRecord> {
    RecordReader::new(bytes).collect::<Result<_, _>>().unwrap()
}

#[test]
fn test_one_record_per_line() {
    let logs = sample_logs(50);
    let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let (sink, stats) = pipeline.run(logs.as_bytes(), BinarySink::new(Vec::new())).unwrap();

    assert_eq!(stats.lines_read, 50);
    assert_eq!(stats.records_written, 50);
    assert_eq!(stats.batches_flushed, 1);
    assert_eq!(sink.into_inner().len(), 50 * RECORD_SIZE);
}

#[test]
fn test_runs_are_deterministic() {
    let logs = sample_logs(200);
    let config = PipelineConfig {
        batch_size: 16,
        ..Default::default()
    };
    assert_eq!(run_binary(config.clone(), &logs), run_binary(config, &logs));
}

#[test]
fn test_parallel_matches_sequential() {
    let logs = sample_logs(500);
    let sequential = run_binary(
        PipelineConfig {
            batch_size: 37,
            ..Default::default()
        },
        &logs,
    );
    let parallel = run_binary(
        PipelineConfig {
            batch_size: 37,
            workers: 4,
            ..Default::default()
        },
        &logs,
    );
    assert_eq!(sequential.len(), 500 * RECORD_SIZE);
    assert_eq!(sequential, parallel);
}

#[test]
fn test_batch_boundaries_invisible() {
    let logs = sample_logs(100);
    let small = run_binary(
        PipelineConfig {
            batch_size: 1,
            ..Default::default()
        },
        &logs,
    );
    let large = run_binary(PipelineConfig::default(), &logs);
    assert_eq!(small, large);
}

#[test]
fn test_configured_format_selects_encoding() {
    let logs = sample_logs(5);
    let binary = SharedBuffer::default();
    Pipeline::new(PipelineConfig::default())
        .unwrap()
        .run_to_writer(logs.as_bytes(), binary.clone())
        .unwrap();
    assert_eq!(binary.contents(), run_binary(PipelineConfig::default(), &logs));

    let csv = SharedBuffer::default();
    let config = PipelineConfig {
        output_format: OutputFormat::Csv,
        ..Default::default()
    };
    Pipeline::new(config).unwrap().run_to_writer(logs.as_bytes(), csv.clone()).unwrap();
    let text = String::from_utf8(csv.contents()).unwrap();
    assert!(text.starts_with(CSV_HEADER));
    assert_eq!(text.lines().count(), 6);
}

#[test]
fn test_unique_client_only_once() {
    let line = log_line("198.51.100.1", "show/ep1.mp3", 206, 1024, 4096, Some((0, 1023)));
    let other_client = log_line("198.51.100.2", "show/ep1.mp3", 206, 1024, 4096, Some((0, 1023)));
    let logs = format!("{line}\n{line}\n{other_client}\n");

    let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let (sink, stats) = pipeline.run(logs.as_bytes(), BinarySink::new(Vec::new())).unwrap();
    let records = decode_all(&sink.into_inner());
    let flags: Vec<u8> = records.iter().map(|r| r.flags).collect();
    assert_eq!(flags, vec![0x03, 0x02, 0x03]);
    assert_eq!(stats.unique_clients, 2);
    assert_eq!(pipeline.dedup_table().len(), 2);
}

#[test]
fn test_flag_scenarios_end_to_end() {
    let logs = [
        log_line("192.0.2.1", "a/b.mp3", 206, 1024, 4096, Some((0, 1023))),
        log_line("192.0.2.1", "a/b.mp3", 206, 1, 4096, Some((2048, 2048))),
        log_line("192.0.2.1", "a/b.mp3", 206, 1095, 4096, Some((3001, 4096))),
        log_line("192.0.2.1", "a/b.mp3", 200, 4096, 4096, None),
    ]
    .join("\n");

    let records = decode_all(&run_binary(PipelineConfig::default(), &logs));
    let flags: Vec<u8> = records.iter().map(|r| r.flags).collect();
    assert_eq!(flags, vec![0x03, 0x04, 0x08, 0x00]);
    assert_eq!(records[0].status_code, 206);
    assert_eq!(records[0].completion_percent, 25);
    assert_eq!(records[3].completion_percent, 100);
}

#[test]
fn test_stop_flag_before_run() {
    let buffer = SharedBuffer::default();
    let stop = Arc::new(AtomicBool::new(true));
    let mut pipeline = Pipeline::new(PipelineConfig::default())
        .unwrap()
        .with_stop_flag(stop);

    let (_, stats) = pipeline
        .run(sample_logs(20).as_bytes(), BinarySink::new(buffer.clone()))
        .unwrap();
    assert!(stats.stopped_early);
    assert_eq!(stats.records_written, 0);
    assert!(buffer.contents().is_empty());
}

/// Line source that raises the stop flag once `after` lines were consumed.
struct StoppingReader<'a> {
    data: &'a [u8],
    lines: usize,
    after: usize,
    stop: Arc<AtomicBool>,
}

impl Read for StoppingReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for StoppingReader<'_> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Ok(self.data)
    }

    fn consume(&mut self, amt: usize) {
        self.lines += self.data[..amt].iter().filter(|b| **b == b'\n').count();
        self.data = &self.data[amt..];
        if self.lines >= self.after {
            self.stop.store(true, Ordering::Relaxed);
        }
    }
}

#[test]
fn test_stop_during_run_ends_on_batch_boundary() {
    let logs = sample_logs(10);
    let stop = Arc::new(AtomicBool::new(false));
    let input = StoppingReader {
        data: logs.as_bytes(),
        lines: 0,
        after: 5,
        stop: stop.clone(),
    };
    let config = PipelineConfig {
        batch_size: 4,
        ..Default::default()
    };
    let mut pipeline = Pipeline::new(config).unwrap().with_stop_flag(stop);
    let (sink, stats) = pipeline.run(input, BinarySink::new(Vec::new())).unwrap();

    // The flag rises inside the second batch, which is still written whole.
    assert!(stats.stopped_early);
    assert_eq!(stats.lines_read, 8);
    assert_eq!(stats.records_written, 8);
    assert_eq!(stats.batches_flushed, 2);

    let bytes = sink.into_inner();
    assert_eq!(bytes.len(), 8 * RECORD_SIZE);
    let expected = run_binary(PipelineConfig::default(), &logs);
    assert_eq!(bytes, expected[..8 * RECORD_SIZE]);
}

/// Accepts `budget` bytes, fails once, then accepts everything.
#[derive(Clone)]
struct FailOnceBuffer {
    shared: SharedBuffer,
    budget: usize,
    failed: Arc<AtomicBool>,
}

impl Write for FailOnceBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.shared.0.lock().len();
        if !self.failed.load(Ordering::Relaxed) && written + buf.len() > self.budget {
            self.failed.store(true, Ordering::Relaxed);
            return Err(io::Error::other("transient"));
        }
        self.shared.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_sink_failure_never_duplicates_records() {
    let logs = sample_logs(5);
    let out = FailOnceBuffer {
        shared: SharedBuffer::default(),
        budget: 2 * RECORD_SIZE,
        failed: Arc::new(AtomicBool::new(false)),
    };
    let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let result = pipeline.run(logs.as_bytes(), BinarySink::new(out.clone()));
    assert!(matches!(result, Err(SlimLogError::Io(_))));

    let written = out.shared.contents();
    assert_eq!(written.len(), 2 * RECORD_SIZE);
    let expected = run_binary(PipelineConfig::default(), &logs);
    assert_eq!(written, expected[..2 * RECORD_SIZE]);
}

#[test]
fn test_csv_header_once_across_batches() {
    let buffer = SharedBuffer::default();
    let config = PipelineConfig {
        batch_size: 3,
        output_format: OutputFormat::Csv,
        ..Default::default()
    };
    let mut pipeline = Pipeline::new(config).unwrap();
    let stats = pipeline
        .run_to_writer(sample_logs(10).as_bytes(), buffer.clone())
        .unwrap();
    assert_eq!(stats.batches_flushed, 4);

    let text = String::from_utf8(buffer.contents()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 11);
    assert_eq!(lines.iter().filter(|l| **l == CSV_HEADER).count(), 1);
    assert_eq!(lines[0], CSV_HEADER);
}

#[test]
fn test_blank_and_malformed_lines_are_counted() {
    let good = log_line("192.0.2.9", "x/y.mp3", 200, 10, 10, None);
    let bad_time = good.replace("[03/May/2025:01:02:03 +0000]", "[yesterday]");
    let long = format!("{good} {}", "z".repeat(10_000));
    let logs = format!("{good}\r\n\n   \n{bad_time}\n{long}\nshort line\n");

    let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let (sink, stats) = pipeline.run(logs.as_bytes(), BinarySink::new(Vec::new())).unwrap();

    assert_eq!(stats.lines_read, 6);
    assert_eq!(stats.blank_lines, 2);
    assert_eq!(stats.records_written, 4);
    assert_eq!(stats.malformed_times, 1);
    assert_eq!(stats.truncated_lines, 1);
    assert_eq!(stats.overrun_lines, 1);

    let records = decode_all(&sink.into_inner());
    assert_eq!(records[1].timestamp, 0);
    assert_eq!(records[3].status_code, 0);
}

#[test]
fn test_full_dedup_table_is_fatal() {
    let logs = format!(
        "{}\n{}\n",
        log_line("192.0.2.1", "a/1.mp3", 206, 1, 4096, Some((0, 0))),
        log_line("192.0.2.2", "a/2.mp3", 206, 1, 4096, Some((0, 0))),
    );
    let config = PipelineConfig {
        dedup_capacity: 1,
        ..Default::default()
    };
    let mut pipeline = Pipeline::new(config).unwrap();
    let result = pipeline.run(logs.as_bytes(), BinarySink::new(Vec::new()));
    assert!(matches!(result, Err(SlimLogError::DedupTableFull { capacity: 1 })));
}

#[test]
fn test_invalid_config_rejected() {
    let config = PipelineConfig {
        workers: 0,
        ..Default::default()
    };
    assert!(matches!(Pipeline::new(config), Err(SlimLogError::InvalidCapacity { .. })));
}
