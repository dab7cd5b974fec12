//! # s3slim
//!
//! Compacts S3 server access logs into fixed 28-byte records and reads them
//! back for analysis.
//!
//! * **Small**: every log line, whatever its length, becomes one 28-byte record
//! * **Streaming**: input is processed in batches with constant memory
//! * **Queryable**: records can be re-read and grouped by podcast, client or day
//!
//! ## Main Components
//!
//! * `tokenizer`: splits a raw access log line into its fields
//! * `user_agent`: classifies the client application, OS and device
//! * `compactor`: projects a parsed line into a [`CompactRecord`]
//! * `dedup_table`: remembers which clients already started a download
//! * `pipeline`: batch driver from text lines to a [`RecordSink`]
//! * `record_reader` and `extract`: read records back and render JSON
//!
//! ## Quick Start
//!
//! ```
//! use s3slim::{BinarySink, Pipeline, PipelineConfig, RecordReader};
//!
//! let logs = "owner bucket [06/Feb/2019:00:00:38 +0000] 192.0.2.3 - REQ1 \
//!             REST.GET.OBJECT show/ep1.mp3 \"GET /show/ep1.mp3 HTTP/1.1\" 206 - \
//!             1024 4096 12 11 \"-\" \"AppleCoreMedia/1.0 (iPhone; iOS 12.1)\" - \
//!             HOST SigV4 CIPHER AuthHeader host TLSv1.2 - - \"bytes=0-1023\"\n";
//!
//! let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
//! let (sink, stats) = pipeline.run(logs.as_bytes(), BinarySink::new(Vec::new())).unwrap();
//! assert_eq!(stats.records_written, 1);
//!
//! let bytes = sink.into_inner();
//! let record = RecordReader::new(bytes.as_slice()).next().unwrap().unwrap();
//! assert_eq!(record.status_code, 206);
//! assert_eq!(record.flags, 0x03);
//! ```

pub mod access_time;
pub mod batch_writer;
pub mod compactor;
pub mod config;
pub mod dedup_table;
pub mod error;
pub mod extract;
pub mod hashing;
pub mod logging;
pub mod pipeline;
pub mod record_reader;
pub mod slim_record;
pub mod tokenizer;
pub mod user_agent;

pub use batch_writer::{BatchWriter, BinarySink, CsvSink, RecordSink};
pub use config::{ExtractConfig, GroupBy, OutputFormat, PipelineConfig};
pub use error::{Result, SlimLogError};
pub use extract::{extract_to_json, ExtractStats};
pub use pipeline::{Pipeline, PipelineStats};
pub use record_reader::RecordReader;
pub use slim_record::{CompactRecord, DownloadFlags};
