use flexi_logger::{FlexiLoggerError, Logger, LoggerHandle};

/// Environment variable holding a flexi_logger spec, e.g. `debug` or
/// `reparse=trace`.
pub const LOG_ENV: &str = "GETOPTX_LOG";

/// Start logging to stderr with `spec`.
pub fn init_logging(spec: &str) -> Result<LoggerHandle, FlexiLoggerError> {
    Logger::try_with_str(spec)?
        .log_to_stderr()
        .format(flexi_logger::default_format)
        .start()
}

/// Start logging if [`LOG_ENV`] is set. The handle must be kept alive for
/// as long as logging is wanted.
pub fn init_from_env() -> Option<LoggerHandle> {
    let spec = std::env::var(LOG_ENV).ok()?;
    match init_logging(&spec) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("getoptx: ignoring {}: {}", LOG_ENV, e);
            None
        }
    }
}
