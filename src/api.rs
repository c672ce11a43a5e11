//! High-level API for reachability-monitor.
//!
//! This module provides the [`Monitor`] struct, the main entry point for
//! programmatic use of the library, and [`run_main`], the complete audit run
//! used by the binary.
//!
//! # Overview
//!
//! [`Monitor`] ties the components of an audit together:
//!
//! - The [`DirectoryReader`] supplying instance records
//! - The [`ReachabilityChecker`] probing them through Tor
//! - The [`ControlSession`] used for diagnostics
//!
//! # Audit Run
//!
//! ```text
//! ┌─────────────────┐
//! │  from_config()  │ ◄── Validate config, open control session
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    audit()      │ ◄── Fetch directory, check instances in order
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    close()      │ ◄── Release the control session
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  ResultSink     │ ◄── results_<stamp>.json, partial if the audit aborted
//! └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use reachability_monitor::{Config, Monitor};
//!
//! #[tokio::main]
//! async fn main() -> reachability_monitor::Result<()> {
//!     let mut monitor = Monitor::from_config(Config::default()).await?;
//!     let mut records = Vec::new();
//!     let summary = monitor.audit(&mut records).await;
//!     monitor.close();
//!
//!     println!("{} unreachable", summary?.unreachable);
//!     Ok(())
//! }
//! ```
//!
//! # Security
//!
//! - The control password is held in a [`SecurePassword`] for as long as the
//!   session may need to re-authenticate, and cleared from memory with
//!   [`zeroize`] when the session is dropped

use zeroize::Zeroize;

use crate::checker::{CheckSettings, CheckSummary, ReachabilityChecker, SocksProber};
use crate::config::{Config, LogLevel};
use crate::control::{ControlSession, VERSION};
use crate::directory::DirectoryReader;
use crate::error::Result;
use crate::logger::plog;
use crate::record::InstanceRecord;
use crate::results::ResultSink;

/// A password wrapper that zeroizes memory on drop.
///
/// Debug output shows `[REDACTED]` instead of the password.
///
/// # Example
///
/// ```rust
/// use reachability_monitor::SecurePassword;
///
/// let password = SecurePassword::new("my_secret_password".to_string());
/// assert_eq!(password.as_str(), "my_secret_password");
///
/// let debug = format!("{:?}", password);
/// assert!(debug.contains("REDACTED"));
/// ```
#[derive(Clone)]
pub struct SecurePassword(String);

impl SecurePassword {
    /// Creates a new secure password wrapper.
    pub fn new(password: String) -> Self {
        Self(password)
    }

    /// Returns a reference to the password string.
    ///
    /// Avoid converting the result to an owned `String`; the copy would not
    /// be zeroized.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Drop for SecurePassword {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for SecurePassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecurePassword([REDACTED])")
    }
}

/// One audit run against a live Tor instance.
///
/// # Lifecycle
///
/// [`from_config`](Monitor::from_config) opens the control session,
/// [`audit`](Monitor::audit) can then be called, and [`close`](Monitor::close)
/// releases the session. Dropping the monitor without `close` also releases
/// it.
pub struct Monitor {
    directory: DirectoryReader,
    checker: ReachabilityChecker,
    config: Config,
}

impl Monitor {
    /// Validates `config` and opens the control session.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - The HTTP clients cannot be built
    /// - Connection to or authentication with Tor fails
    pub async fn from_config(config: Config) -> Result<Self> {
        config.validate()?;

        let directory = DirectoryReader::from_config(&config)?;
        let prober = SocksProber::new(&config.socks_proxy, &config.user_agent)?;
        let session = ControlSession::open(&config).await?;
        let checker = ReachabilityChecker::new(prober, session, CheckSettings::from(&config));

        Ok(Self {
            directory,
            checker,
            config,
        })
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetches the directory into `records` and checks every instance.
    ///
    /// `records` is filled before checking starts, so after an error it holds
    /// every listed instance: checked ones with results, the rest unchecked.
    ///
    /// # Errors
    ///
    /// Returns the directory fetch error, or the first unexpected check error.
    pub async fn audit(&mut self, records: &mut Vec<InstanceRecord>) -> Result<CheckSummary> {
        *records = self.directory.fetch().await?;
        self.checker.check_all(records).await
    }

    /// Releases the control session.
    pub fn close(self) {
        self.checker.into_session().close();
    }
}

/// Runs a complete audit and writes the result file.
///
/// Results are written to `<output_dir>/results_<run_stamp>.json`. If the
/// audit aborts after the directory was read, the partial record set is
/// still written before the error is returned.
///
/// # Errors
///
/// Returns the first fatal error of the run.
pub async fn run_main(config: Config, run_stamp: &str) -> Result<()> {
    plog(
        LogLevel::Notice,
        &format!("reachability-monitor {} starting audit", VERSION),
    );

    let sink = ResultSink::new(&config.output_dir, run_stamp);
    let mut monitor = Monitor::from_config(config).await?;

    let mut records = Vec::new();
    let outcome = monitor.audit(&mut records).await;
    monitor.close();

    finish_run(&sink, &records, outcome)
}

/// Persists `records` and passes the audit outcome through.
fn finish_run(
    sink: &ResultSink,
    records: &[InstanceRecord],
    outcome: Result<CheckSummary>,
) -> Result<()> {
    match outcome {
        Ok(_) => sink.write(records),
        Err(e) => {
            plog(LogLevel::Error, &format!("Audit aborted: {}", e));
            if !records.is_empty() {
                sink.write(records)?;
            }
            Err(e)
        }
    }
}
