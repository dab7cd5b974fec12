use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tracing::{error, info, warn};

use s3slim::config::{OutputFormat, PipelineConfig, BATCH_SIZE};
use s3slim::dedup_table::DEDUP_CAPACITY;
use s3slim::logging::init_logging;
use s3slim::pipeline::Pipeline;

/// Compacts S3 server access logs into fixed-size records.
#[derive(Parser, Debug)]
#[command(name = "s3lp", version)]
struct Cli {
    /// Input log file (stdin when omitted)
    #[arg(short = 'f', long = "file")]
    input: Option<PathBuf>,

    /// Output file (stdout when omitted)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Output type: b(in) or c(sv)
    #[arg(short = 't', long = "type", default_value = "b")]
    output_format: OutputFormat,

    /// Threads used to tokenize each batch
    #[arg(short = 'w', long, default_value_t = 1)]
    workers: usize,

    #[arg(long, default_value_t = BATCH_SIZE)]
    batch_size: usize,

    /// Slots in the unique-client table
    #[arg(long, default_value_t = DEDUP_CAPACITY)]
    dedup_capacity: usize,

    /// Per-line diagnostics and progress
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_io() => {
            error!("I/O failure, output may be incomplete: {e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{e}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> s3slim::Result<()> {
    let config = PipelineConfig {
        batch_size: cli.batch_size,
        dedup_capacity: cli.dedup_capacity,
        output_format: cli.output_format,
        workers: cli.workers,
        verbose: cli.verbose,
    };

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_stop.store(true, Ordering::Relaxed)) {
        warn!("Failed to install Ctrl-C handler: {e}");
    }

    let input: Box<dyn BufRead> = match &cli.input {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(io::stdin().lock()),
    };
    let output: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let mut pipeline = Pipeline::new(config)?.with_stop_flag(stop);
    info!(
        workers = pipeline.config().workers,
        batch_size = pipeline.config().batch_size,
        format = ?pipeline.config().output_format,
        "Starting"
    );
    let started = Instant::now();
    let stats = pipeline.run_to_writer(input, output)?;

    info!(
        records = stats.records_written,
        batches = stats.batches_flushed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        stopped_early = stats.stopped_early,
        unique_keys = pipeline.dedup_table().len(),
        "Done"
    );
    Ok(())
}
