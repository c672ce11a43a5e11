//! # reachability-monitor
//!
//! Audits the reachability of the SecureDrop instances listed in the public
//! directory, through a local Tor instance.
//!
//! # Overview
//!
//! For every listed instance the monitor fetches the landing page through
//! Tor's SOCKS proxy and records the advertised version, or `"unreachable"`.
//! Unreachable instances get diagnostics from Tor's control port: the cached
//! hidden service descriptor and snapshots of the client introduction and
//! rendezvous circuits that were built for the attempt.
//!
//! ## Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`api`] | High-level [`Monitor`] struct and [`api::run_main`] |
//! | [`checker`] | Per-instance probe, classification and diagnostics |
//! | [`control`] | Tor control-port session |
//! | [`directory`] | Instance directory fetch and parsing |
//! | [`record`] | Instance records and circuit snapshots |
//! | [`results`] | Result file output |
//! | [`config`] | Configuration management (TOML, CLI, environment) |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`logger`] | Logging infrastructure using tracing |
//!
//! # What This Library Does NOT Do
//!
//! - **Operate Tor**: A running Tor with SOCKS and control ports is required
//! - **Retry probes**: Each instance gets one probe plus diagnostics
//! - **Keep history**: Every run writes its own result file; nothing is aggregated
//!
//! # Quick Start
//!
//! ## As a Library
//!
//! ```rust,no_run
//! use reachability_monitor::{Config, Monitor};
//!
//! #[tokio::main]
//! async fn main() -> reachability_monitor::Result<()> {
//!     let mut monitor = Monitor::from_config(Config::default()).await?;
//!
//!     let mut records = Vec::new();
//!     let summary = monitor.audit(&mut records).await;
//!     monitor.close();
//!
//!     for record in records.iter().filter(|r| r.is_unreachable()) {
//!         println!("{} ({})", record.organization, record.service_address);
//!     }
//!     summary.map(|_| ())
//! }
//! ```
//!
//! ## As a CLI Application
//!
//! ```bash
//! # Audit with default settings
//! reachability-monitor
//!
//! # Use a Unix control socket and a longer probe timeout
//! reachability-monitor --control-socket /run/tor/control --timeout 60
//!
//! # Generate default configuration file
//! reachability-monitor --generate_config reachability.conf
//! ```
//!
//! # Output
//!
//! Each run writes `results_<MM-DD_HH:MM:SS>.json` and
//! `sdrm_<MM-DD_HH:MM:SS>.log` to the output directory (default `logs`).
//! See [`InstanceRecord`] for the record format.
//!
//! # See Also
//!
//! - [stem-rs documentation](https://stem.tn3w.dev/docs/) - Tor control library
//! - [Tor Control Protocol Specification](https://spec.torproject.org/control-spec) - Protocol reference

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod api;
pub mod checker;
pub mod config;
pub mod control;
pub mod directory;
pub mod error;
pub mod logger;
pub mod record;
pub mod results;

pub use api::{run_main, Monitor, SecurePassword};
pub use checker::{
    CheckOutcome, CheckSettings, CheckSummary, FetchResult, Prober, ReachabilityChecker,
    SocksProber,
};
pub use config::{CliArgs, Config, LogLevel};
pub use control::{
    authenticate_any, CircuitEntry, ControlChannel, ControlEndpoint, ControlSession, TorControl,
    VERSION,
};
pub use directory::DirectoryReader;
pub use error::{Error, Result};
pub use record::{CircuitSnapshot, InstanceRecord, RelayHop, DESCRIPTOR_UNAVAILABLE, UNREACHABLE};
pub use results::{read_results, ResultSink};
