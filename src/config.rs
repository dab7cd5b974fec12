use std::fmt;
use std::str::FromStr;

use crate::dedup_table::DEDUP_CAPACITY;
use crate::error::{Result, SlimLogError};

/// Records buffered before a flush to the sink.
pub const BATCH_SIZE: usize = 10_000;

/// Longest accepted input line in bytes; the rest of a longer line is dropped.
pub const MAX_LINE_LEN: usize = 8 * 1024;

/// How often (in records) verbose runs report progress.
pub const PROGRESS_INTERVAL: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Binary,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = SlimLogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "b" | "bin" | "binary" => Ok(OutputFormat::Binary),
            "c" | "csv" => Ok(OutputFormat::Csv),
            _ => Err(SlimLogError::InvalidOutputFormat(s.to_string())),
        }
    }
}

/// Settings of one parsing run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub dedup_capacity: usize,
    pub output_format: OutputFormat,
    /// Threads used to tokenize and project a batch. `1` keeps everything
    /// on the calling thread.
    pub workers: usize,
    pub verbose: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            dedup_capacity: DEDUP_CAPACITY,
            output_format: OutputFormat::Binary,
            workers: 1,
            verbose: false,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(SlimLogError::InvalidCapacity { what: "batch size" });
        }
        if self.dedup_capacity == 0 {
            return Err(SlimLogError::InvalidCapacity {
                what: "dedup table capacity",
            });
        }
        if self.workers == 0 {
            return Err(SlimLogError::InvalidCapacity { what: "worker count" });
        }
        Ok(())
    }
}

/// Dimension used to group records in the extraction tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupBy {
    #[default]
    None,
    Podcast,
    Client,
    Day,
}

impl GroupBy {
    /// Name written to the `grouped_by` member of the JSON output.
    pub fn name(self) -> &'static str {
        match self {
            GroupBy::None => "none",
            GroupBy::Podcast => "podcast",
            GroupBy::Client => "ip_address",
            GroupBy::Day => "day",
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GroupBy {
    type Err = SlimLogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "n" | "none" => Ok(GroupBy::None),
            "p" | "podcast" => Ok(GroupBy::Podcast),
            "i" | "ip" | "ip_address" | "client" => Ok(GroupBy::Client),
            "t" | "time" | "d" | "day" => Ok(GroupBy::Day),
            _ => Err(SlimLogError::InvalidGroupBy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExtractConfig {
    pub group_by: GroupBy,
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selectors() {
        assert_eq!("c".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!("BIN".parse::<OutputFormat>().unwrap(), OutputFormat::Binary);
        assert!("x".parse::<OutputFormat>().is_err());

        assert_eq!("p".parse::<GroupBy>().unwrap(), GroupBy::Podcast);
        assert_eq!("client".parse::<GroupBy>().unwrap(), GroupBy::Client);
        assert_eq!("t".parse::<GroupBy>().unwrap(), GroupBy::Day);
        assert_eq!("n".parse::<GroupBy>().unwrap(), GroupBy::None);
        assert!(matches!("q".parse::<GroupBy>(), Err(SlimLogError::InvalidGroupBy(_))));
    }

    #[test]
    fn test_validate() {
        assert!(PipelineConfig::default().validate().is_ok());
        let config = PipelineConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
