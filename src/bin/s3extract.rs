use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use s3slim::config::{ExtractConfig, GroupBy};
use s3slim::extract::extract_to_json;
use s3slim::logging::init_logging;

/// Reads compact records and prints them as JSON, optionally grouped.
#[derive(Parser, Debug)]
#[command(name = "s3extract", version)]
struct Cli {
    /// Binary record file (stdin when omitted)
    #[arg(short = 'f', long = "file")]
    input: Option<PathBuf>,

    /// JSON output file (stdout when omitted)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Grouping: n(one), p(odcast), i(p), t(ime)
    #[arg(short = 'g', long = "group", default_value = "n")]
    group_by: GroupBy,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging(cli.verbose);

    let config = ExtractConfig {
        group_by: cli.group_by,
        verbose: cli.verbose,
    };

    let result = open_input(cli.input.as_ref()).and_then(|input| {
        let output = open_output(cli.output.as_ref())?;
        extract_to_json(input, output, &config)
    });

    match result {
        Ok(_) => ExitCode::SUCCESS,
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

fn open_input(path: Option<&PathBuf>) -> s3slim::Result<Box<dyn Read>> {
    Ok(match path {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin().lock())),
    })
}

fn open_output(path: Option<&PathBuf>) -> s3slim::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}
