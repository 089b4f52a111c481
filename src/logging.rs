//! Logging configuration with optional file rotation
//!
//! # Example
//!
//! ```rust
//! use coro_rt::logging::init_console_logging;
//!
//! init_console_logging("info").unwrap();
//! ```

use crate::error::{Error, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize console-only logging (no file sink). Intended for tests and demos.
pub fn init_console_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .try_init()
        .map_err(|e| Error::internal(format!("failed to init tracing: {e}")))?;

    Ok(())
}

/// Initialize logging with daily file rotation alongside a compact console layer.
///
/// - `directory`: directory to store log files
/// - `filename_prefix`: prefix for rotated log files (e.g. "coro-rt.log")
/// - `level`: default log level (e.g. "info", "debug"), overridden by `RUST_LOG`
pub fn init_logging(directory: &str, filename_prefix: &str, level: &str) -> Result<()> {
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(filename_prefix)
        .build(directory)
        .map_err(|e| Error::internal(format!("failed to create log appender: {e}")))?;

    let console_layer = fmt::layer().with_target(false).compact();
    let file_layer = fmt::layer().with_writer(file_appender).with_ansi(false);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::internal(format!("failed to init tracing: {e}")))?;

    Ok(())
}
