//! Logging infrastructure for reachability-monitor.
//!
//! This module provides logging functionality using the tracing ecosystem.
//! Every run writes a human-readable, timestamped log file next to its result
//! file; unreachable instances are logged there as they are processed.
//!
//! # Log Levels
//!
//! | Level | Description | Use Case |
//! |-------|-------------|----------|
//! | [`Debug`](crate::LogLevel::Debug) | Low-level debugging | Control-port traffic |
//! | [`Info`](crate::LogLevel::Info) | Informational messages | Per-instance progress |
//! | [`Notice`](crate::LogLevel::Notice) | Notable events | Default level, unreachable instances |
//! | [`Warn`](crate::LogLevel::Warn) | Warning conditions | Malformed responses |
//! | [`Error`](crate::LogLevel::Error) | Error conditions | Run aborts |
//!
//! # Example
//!
//! ```rust,no_run
//! use reachability_monitor::{LogLevel, logger};
//! use std::path::Path;
//!
//! // Per-run log file logs/sdrm_10-19_12:00:00.log
//! let path = logger::run_log_path(Path::new("logs"), "10-19_12:00:00");
//! logger::init(LogLevel::Notice, Some(&path)).unwrap();
//!
//! logger::plog(LogLevel::Notice, "Audit started");
//! ```
//!
//! # See Also
//!
//! - [`crate::config::LogLevel`] - Log level enumeration
//! - [tracing crate](https://docs.rs/tracing) - Underlying logging framework

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use crate::config::LogLevel;
use crate::error::{Error, Result};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Returns the per-run log file path, `<dir>/sdrm_<stamp>.log`.
pub fn run_log_path(dir: &Path, run_stamp: &str) -> PathBuf {
    dir.join(format!("sdrm_{}.log", run_stamp))
}

/// Initialize the logging system.
///
/// Subsequent calls are no-ops.
///
/// # Arguments
///
/// * `level` - The minimum log level to output
/// * `logfile` - `None` logs to stdout with ANSI colors; `Some(path)` logs to
///   that file, creating its parent directory if needed
///
/// # Errors
///
/// Returns [`Error::Io`] if the log directory cannot be created and
/// [`Error::Config`] if the file cannot be opened or a global subscriber is
/// already installed.
///
/// # Notes
///
/// - The `RUST_LOG` environment variable can override the configured level
pub fn init(level: LogLevel, logfile: Option<&Path>) -> Result<()> {
    if LOGGER_INITIALIZED.get().is_some() {
        return Ok(());
    }

    let filter = match level {
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Notice => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match logfile {
        None => {
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_thread_ids(false)
                .with_span_events(FmtSpan::NONE)
                .with_ansi(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| Error::Config(format!("failed to set logger: {}", e)))?;
        }
        Some(path) => {
            init_file_logger(path, env_filter)?;
        }
    }

    LOGGER_INITIALIZED.get_or_init(|| ());
    Ok(())
}

fn init_file_logger(path: &Path, env_filter: EnvFilter) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Config(format!("invalid log file path: {}", path.display())))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .map_err(|e| Error::Config(format!("cannot open log file {}: {}", path.display(), e)))?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_ansi(false)
        .with_writer(appender)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Config(format!("failed to set logger: {}", e)))?;

    Ok(())
}

/// Log a message at the specified level.
///
/// # Level Mapping
///
/// | LogLevel | tracing macro |
/// |----------|---------------|
/// | Debug | `debug!` |
/// | Info | `info!` |
/// | Notice | `info!` |
/// | Warn | `warn!` |
/// | Error | `error!` |
///
/// # Example
///
/// ```rust
/// use reachability_monitor::{LogLevel, logger};
///
/// logger::plog(LogLevel::Notice, "Audit started");
/// logger::plog(LogLevel::Warn, "Unexpected landing page");
/// ```
pub fn plog(level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => debug!("{}", message),
        LogLevel::Info => info!("{}", message),
        LogLevel::Notice => info!("{}", message),
        LogLevel::Warn => warn!("{}", message),
        LogLevel::Error => error!("{}", message),
    }
}

/// Log a formatted message at the specified level.
///
/// # Example
///
/// ```rust
/// use reachability_monitor::{LogLevel, plog_fmt};
///
/// plog_fmt!(LogLevel::Notice, "Connected to Tor version {}", "0.4.8.12");
/// ```
#[macro_export]
macro_rules! plog_fmt {
    ($level:expr, $($arg:tt)*) => {
        $crate::logger::plog($level, &format!($($arg)*))
    };
}
