//! Error types for the slim log pipeline.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SlimLogError>;

/// Fatal errors. Data-quality problems inside a log line are never reported
/// through this type; they fall back to field defaults and are counted in
/// [`PipelineStats`](crate::pipeline::PipelineStats).
#[derive(Debug, Error)]
pub enum SlimLogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Dedup table full: all {capacity} slots claimed")]
    DedupTableFull { capacity: usize },

    #[error("Invalid capacity: {what} must be greater than zero")]
    InvalidCapacity { what: &'static str },

    #[error("Truncated record at byte {offset}: only {len} of 28 bytes present")]
    TruncatedRecord { offset: u64, len: usize },

    #[error("Invalid grouping '{0}'. Use: p(odcast), i(p), t(ime), or n(one)")]
    InvalidGroupBy(String),

    #[error("Invalid output format '{0}'. Use: b(in) or c(sv)")]
    InvalidOutputFormat(String),
}

impl SlimLogError {
    /// True for errors caused by the surrounding I/O rather than by
    /// resource limits of the run.
    pub fn is_io(&self) -> bool {
        matches!(self, SlimLogError::Io(_) | SlimLogError::Json(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_classification() {
        let io = SlimLogError::from(std::io::Error::other("disk gone"));
        assert!(io.is_io());
        assert!(!SlimLogError::DedupTableFull { capacity: 3 }.is_io());
        assert!(!SlimLogError::TruncatedRecord { offset: 0, len: 1 }.is_io());
    }
}
