use flexi_logger::{FlexiLoggerError, Logger, LoggerHandle};

/// Log to stdout at `warn`, or `info` in verbose mode. `RUST_LOG` takes precedence.
///
/// Logging stops when the returned handle is dropped.
pub fn init_logging(verbose: bool) -> Result<LoggerHandle, FlexiLoggerError> {
    let level = if verbose { "info" } else { "warn" };
    Logger::try_with_env_or_str(level)?.log_to_stdout().start()
}
