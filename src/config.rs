//! Configuration management for reachability-monitor.
//!
//! This module provides configuration parsing from TOML files, command-line arguments,
//! and environment variables. Configuration is applied in order: defaults → config file →
//! command-line arguments, with later sources overriding earlier ones.
//!
//! # Configuration Flow
//!
//! ```text
//!     ┌─────────────────┐
//!     │ Config::default │ ◄── Start with sensible defaults
//!     └────────┬────────┘
//!              │
//!              ▼
//!     ┌─────────────────┐     ┌────────────────────┐
//!     │ Config file     │ ◄───│ reachability.conf  │  (TOML format)
//!     │ exists?         │     │ or --config        │
//!     └────────┬────────┘     └────────────────────┘
//!              │
//!              ▼
//!     ┌─────────────────┐     ┌─────────────────┐
//!     │ Apply CLI args  │ ◄───│ --socks-proxy   │
//!     │ (override)      │     │ --timeout, etc. │
//!     └────────┬────────┘     └─────────────────┘
//!              │
//!              ▼
//!     ┌─────────────────┐
//!     │ Validate &      │
//!     │ resolve hosts   │
//!     └─────────────────┘
//! ```
//!
//! # Example Configuration File
//!
//! ```toml
//! # Tor control port
//! control_ip = "127.0.0.1"
//! control_port = 9051
//! # control_socket = "/run/tor/control"
//! # control_pass = "my_password"
//!
//! # Tor SOCKS proxy used for probing
//! socks_proxy = "127.0.0.1:9050"
//!
//! # Instance directory
//! directory_url = "https://securedrop.org/sites/securedrop.org/files/securedrop_list.txt"
//! app_name = "SecureDrop"
//!
//! # Timeouts
//! probe_timeout_secs = 30
//! descriptor_timeout_secs = 60
//!
//! # Output
//! output_dir = "logs"
//! loglevel = "notice"
//! # logfile = "-"   # stdout instead of the per-run log file
//! ```
//!
//! # See Also
//!
//! - [`LogLevel`] for logging configuration
//! - [`CliArgs`] for command-line argument parsing

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Public SecureDrop directory listing.
pub const DEFAULT_DIRECTORY_URL: &str =
    "https://securedrop.org/sites/securedrop.org/files/securedrop_list.txt";

/// User-Agent sent with the directory request; the CDN blocks library defaults.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 6.1; rv:45.0) Gecko/20100101 Firefox/45.0";

/// Log level for reachability-monitor output.
///
/// From most to least verbose:
/// [`Debug`](LogLevel::Debug) > [`Info`](LogLevel::Info) > [`Notice`](LogLevel::Notice) >
/// [`Warn`](LogLevel::Warn) > [`Error`](LogLevel::Error)
///
/// # Example
///
/// ```rust
/// use reachability_monitor::LogLevel;
///
/// let level: LogLevel = "warning".parse().unwrap();
/// assert_eq!(level, LogLevel::Warn);
/// assert!(LogLevel::Notice < level);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Low-level debugging information.
    Debug,
    /// Informational messages about normal operation.
    Info,
    /// Notable events, including every unreachable instance.
    #[default]
    Notice,
    /// Warning conditions that don't prevent operation.
    Warn,
    /// Error conditions that may impair functionality.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Notice => write!(f, "NOTICE"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "NOTICE" => Ok(LogLevel::Notice),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" | "ERR" => Ok(LogLevel::Error),
            _ => Err(Error::Config(format!("invalid log level: {}", s))),
        }
    }
}

/// Main configuration struct for reachability-monitor.
///
/// # Fields Overview
///
/// | Field | Type | Default | Description |
/// |-------|------|---------|-------------|
/// | `control_ip` | `String` | `"127.0.0.1"` | Tor control port IP address |
/// | `control_port` | `Option<u16>` | `None` | Tor control port (None = auto-detect) |
/// | `control_socket` | `Option<PathBuf>` | `None` | Unix socket path |
/// | `control_pass` | `Option<String>` | `None` | Control port password |
/// | `socks_proxy` | `String` | `"127.0.0.1:9050"` | Tor SOCKS5 endpoint |
/// | `directory_url` | `String` | SecureDrop listing | Instance directory |
/// | `user_agent` | `String` | Firefox UA | User-Agent for the directory fetch |
/// | `app_name` | `String` | `"SecureDrop"` | Application name in the version banner |
/// | `probe_timeout_secs` | `u64` | `30` | Per-instance probe timeout |
/// | `descriptor_timeout_secs` | `u64` | `60` | Bound on descriptor fetches |
/// | `output_dir` | `PathBuf` | `"logs"` | Directory for the run log and results |
/// | `loglevel` | `LogLevel` | `Notice` | Log verbosity |
/// | `logfile` | `Option<String>` | `None` | Log destination override (`"-"` = stdout) |
///
/// # Example
///
/// ```rust
/// use reachability_monitor::Config;
///
/// let mut config = Config::default();
/// config.probe_timeout_secs = 45;
/// config.validate().expect("valid configuration");
/// assert_eq!(config.socks_proxy, "127.0.0.1:9050");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// IP address of the Tor control port.
    #[serde(default = "default_control_ip")]
    pub control_ip: String,
    /// Port number of the Tor control port.
    #[serde(default)]
    pub control_port: Option<u16>,
    /// Path to the Tor control socket.
    #[serde(default)]
    pub control_socket: Option<PathBuf>,
    /// Password for Tor control authentication.
    #[serde(default)]
    pub control_pass: Option<String>,
    /// Tor SOCKS5 proxy endpoint, `host:port`.
    #[serde(default = "default_socks_proxy")]
    pub socks_proxy: String,
    /// URL of the tab-separated instance directory.
    #[serde(default = "default_directory_url")]
    pub directory_url: String,
    /// User-Agent sent with the directory request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Application name expected in `Powered by <app_name> <version>.`.
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Timeout for each proxied probe, in seconds.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// Upper bound on a single descriptor fetch, in seconds.
    #[serde(default = "default_descriptor_timeout_secs")]
    pub descriptor_timeout_secs: u64,
    /// Directory receiving the per-run log and result file.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Log level for output.
    #[serde(default)]
    pub loglevel: LogLevel,
    /// Log destination override. None for the per-run file, "-" for stdout.
    #[serde(default)]
    pub logfile: Option<String>,
}

fn default_control_ip() -> String {
    "127.0.0.1".to_string()
}
fn default_socks_proxy() -> String {
    "127.0.0.1:9050".to_string()
}
fn default_directory_url() -> String {
    DEFAULT_DIRECTORY_URL.to_string()
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_app_name() -> String {
    "SecureDrop".to_string()
}
fn default_probe_timeout_secs() -> u64 {
    30
}
fn default_descriptor_timeout_secs() -> u64 {
    60
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            control_ip: default_control_ip(),
            control_port: None,
            control_socket: None,
            control_pass: None,
            socks_proxy: default_socks_proxy(),
            directory_url: default_directory_url(),
            user_agent: default_user_agent(),
            app_name: default_app_name(),
            probe_timeout_secs: default_probe_timeout_secs(),
            descriptor_timeout_secs: default_descriptor_timeout_secs(),
            output_dir: default_output_dir(),
            loglevel: LogLevel::default(),
            logfile: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read.
    /// Returns [`Error::Config`] if the TOML is invalid.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a timeout is zero, the application name or
    /// directory URL is empty, or the SOCKS proxy is not `host:port`.
    pub fn validate(&self) -> Result<()> {
        if self.probe_timeout_secs == 0 {
            return Err(Error::Config(
                "probe_timeout_secs must be positive".to_string(),
            ));
        }
        if self.descriptor_timeout_secs == 0 {
            return Err(Error::Config(
                "descriptor_timeout_secs must be positive".to_string(),
            ));
        }
        if self.app_name.trim().is_empty() {
            return Err(Error::Config("app_name must not be empty".to_string()));
        }
        if self.directory_url.trim().is_empty() {
            return Err(Error::Config("directory_url must not be empty".to_string()));
        }
        match self.socks_proxy.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
            _ => {
                return Err(Error::Config(format!(
                    "socks_proxy must be host:port, got {:?}",
                    self.socks_proxy
                )))
            }
        }
        Ok(())
    }

    /// Resolve hostname to IP address if control_ip is a domain name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if hostname resolution fails.
    pub fn resolve_control_ip(&mut self) -> Result<()> {
        if self.control_ip.parse::<IpAddr>().is_err() {
            let addr = format!("{}:0", self.control_ip)
                .to_socket_addrs()
                .map_err(|e| {
                    Error::Config(format!(
                        "failed to resolve hostname {}: {}",
                        self.control_ip, e
                    ))
                })?
                .next()
                .ok_or_else(|| {
                    Error::Config(format!(
                        "no addresses found for hostname {}",
                        self.control_ip
                    ))
                })?;
            self.control_ip = addr.ip().to_string();
        }
        Ok(())
    }

    /// Probe timeout as a [`Duration`].
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Descriptor fetch bound as a [`Duration`].
    pub fn descriptor_timeout(&self) -> Duration {
        Duration::from_secs(self.descriptor_timeout_secs)
    }
}

/// Command-line arguments for reachability-monitor.
///
/// Arguments override configuration file values.
///
/// # Examples
///
/// ```bash
/// # Audit with defaults (control port auto-detected, SOCKS on 9050)
/// reachability-monitor
///
/// # Longer probe timeout, results under /var/lib/sdrm
/// reachability-monitor --timeout 60 --output-dir /var/lib/sdrm
///
/// # Generate a default configuration file
/// reachability-monitor --generate_config reachability.conf
/// ```
///
/// # Environment Variables
///
/// - `REACHABILITY_CONFIG`: Path to configuration file (equivalent to `--config`)
/// - `REACHABILITY_OUTPUT_DIR`: Output directory (equivalent to `--output-dir`)
#[derive(Parser, Debug)]
#[command(name = "reachability-monitor")]
#[command(about = "Audit reachability of SecureDrop onion services")]
#[command(version)]
#[command(
    long_about = "reachability-monitor fetches the public SecureDrop directory, probes every \
    listed onion service through Tor, records the advertised version, and collects \
    descriptor and circuit diagnostics for services that cannot be reached."
)]
pub struct CliArgs {
    /// Write default config to file and exit.
    #[arg(long = "generate_config")]
    pub generate_config: Option<PathBuf>,

    /// Path to configuration file.
    #[arg(
        long = "config",
        env = "REACHABILITY_CONFIG",
        default_value = "reachability.conf"
    )]
    pub config_file: PathBuf,

    /// Log verbosity (DEBUG, INFO, NOTICE, WARN, ERROR).
    #[arg(long)]
    pub loglevel: Option<String>,

    /// Log destination; "-" logs to stdout instead of the per-run file.
    #[arg(long)]
    pub logfile: Option<String>,

    /// Directory receiving the run log and the result file.
    #[arg(long, env = "REACHABILITY_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// IP address or hostname of the Tor control port.
    #[arg(long)]
    pub control_ip: Option<String>,

    /// Tor control port number.
    #[arg(long)]
    pub control_port: Option<u16>,

    /// Path to Tor control socket.
    #[arg(long)]
    pub control_socket: Option<PathBuf>,

    /// Tor control port password.
    #[arg(long)]
    pub control_pass: Option<String>,

    /// Tor SOCKS5 proxy, host:port.
    #[arg(long)]
    pub socks_proxy: Option<String>,

    /// URL of the instance directory.
    #[arg(long)]
    pub directory_url: Option<String>,

    /// Probe timeout in seconds.
    #[arg(long = "timeout")]
    pub probe_timeout_secs: Option<u64>,

    /// Upper bound on descriptor fetches in seconds.
    #[arg(long = "descriptor-timeout")]
    pub descriptor_timeout_secs: Option<u64>,
}

impl CliArgs {
    /// Apply CLI arguments to a configuration, overriding values.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(ref loglevel) = self.loglevel {
            if let Ok(level) = loglevel.parse() {
                config.loglevel = level;
            }
        }
        if let Some(ref logfile) = self.logfile {
            config.logfile = Some(logfile.clone());
        }
        if let Some(ref output_dir) = self.output_dir {
            config.output_dir = output_dir.clone();
        }
        if let Some(ref control_ip) = self.control_ip {
            config.control_ip = control_ip.clone();
        }
        if let Some(control_port) = self.control_port {
            config.control_port = Some(control_port);
        }
        if let Some(ref control_socket) = self.control_socket {
            config.control_socket = Some(control_socket.clone());
        }
        if let Some(ref control_pass) = self.control_pass {
            config.control_pass = Some(control_pass.clone());
        }
        if let Some(ref socks_proxy) = self.socks_proxy {
            config.socks_proxy = socks_proxy.clone();
        }
        if let Some(ref directory_url) = self.directory_url {
            config.directory_url = directory_url.clone();
        }
        if let Some(secs) = self.probe_timeout_secs {
            config.probe_timeout_secs = secs;
        }
        if let Some(secs) = self.descriptor_timeout_secs {
            config.descriptor_timeout_secs = secs;
        }
    }
}

/// Load configuration from file and CLI arguments.
///
/// 1. Start with defaults
/// 2. Apply config file if it exists
/// 3. Apply CLI arguments (override)
///
/// # Errors
///
/// Returns [`Error::Config`] if configuration is invalid.
pub fn load_config(args: &CliArgs) -> Result<Config> {
    let mut config = Config::default();

    if args.config_file.exists() {
        config = Config::from_file(&args.config_file)?;
    }

    args.apply_to(&mut config);
    config.resolve_control_ip()?;
    config.validate()?;

    Ok(config)
}
