use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber used by the command-line tools.
///
/// Diagnostics go to stderr through a non-blocking writer, leaving stdout
/// free for record output. The filter defaults to `info` (`debug` when
/// `verbose`) and is overridden by `RUST_LOG`.
///
/// Keep the returned guard alive until the program exits; dropping it flushes
/// buffered log lines.
pub fn init_logging(verbose: bool) -> WorkerGuard {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    // A subscriber may already be installed when called from tests.
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false)
        .try_init();

    guard
}
