//! Control module for the Tor control-port session used during an audit.
//!
//! This module owns the single authenticated connection to Tor's control port
//! that a reachability audit relies on for diagnostics: descriptor lookups for
//! unreachable services and inspection/teardown of hidden-service client
//! circuits.
//!
//! # Overview
//!
//! - **Connection Management**: Connect via Unix socket or TCP with auto-detection
//! - **Authentication**: No-auth/cookie, password, and interactive authentication
//! - **Descriptor Lookup**: `GETINFO hs/client/desc/id/<id>` with an enforced time bound
//! - **Circuit Inspection**: `GETINFO circuit-status` parsed into [`CircuitEntry`] values
//! - **Circuit Teardown**: `CLOSECIRCUIT`, at most once per circuit per session
//!
//! # Session Lifecycle
//!
//! ```text
//!   ┌─────────────────┐
//!   │ open(config)    │ ◄── connect, authenticate, GETINFO version
//!   └────────┬────────┘
//!            │  (fatal on failure, no retry)
//!            ▼
//!   ┌─────────────────────────────────────────────┐
//!   │ fetch_service_descriptor / list_circuits /  │ ◄── one call sequence per instance
//!   │ close_circuit                               │
//!   └────────┬────────────────────────────────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐
//!   │ close(self)     │ ◄── or Drop on early exit; release happens once
//!   └─────────────────┘
//! ```
//!
//! # Descriptor Fetch Bound
//!
//! Tor does not reliably answer descriptor requests for services that are
//! already unreachable; the request can stall indefinitely. Every descriptor
//! fetch is therefore wrapped in [`tokio::time::timeout`], and expiry is
//! reported as [`Error::DescriptorUnavailable`].
//!
//! Abandoning the request leaves its reply queued on the connection, where
//! it would be read as the answer to the next command. The session marks
//! itself out of step and reopens the connection (same endpoint, same
//! credentials) before the next command goes out.
//!
//! # Error Mapping
//!
//! Only Tor's refusal to serve a descriptor (an error status such as `552`),
//! an empty descriptor, or an expired time bound count as
//! [`Error::DescriptorUnavailable`]. A closed socket, an I/O failure or a
//! protocol error on the control connection propagates as [`Error::Control`].
//!
//! # What This Module Does NOT Do
//!
//! - **Probe services**: See [`crate::checker`] for the SOCKS fetch
//! - **Decrypt v3 descriptors**: v3 introduction points are encrypted; the raw
//!   descriptor is returned instead
//! - **Recover lost connections**: Only an abandoned descriptor request
//!   triggers a reconnect; a connection Tor dropped aborts the run
//!
//! # See Also
//!
//! - [`crate::checker`] - Uses the session for per-instance diagnostics
//! - [Tor Control Protocol](https://spec.torproject.org/control-spec) - Protocol specification

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use stem_rs::controller::{CircuitId, Controller};

use crate::api::SecurePassword;
use crate::config::{Config, LogLevel};
use crate::error::{Error, Result};
use crate::logger::plog;
use crate::record::RelayHop;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The subset of the Tor control protocol an audit needs.
///
/// Implemented by [`TorControl`]. The session layers parsing, time bounds and
/// circuit bookkeeping on top of these calls.
#[async_trait(?Send)]
pub trait ControlChannel {
    /// Issues `GETINFO <key>` and returns the value.
    async fn get_info(&mut self, key: &str) -> Result<String>;

    /// Issues `CLOSECIRCUIT <circ_id>`.
    async fn close_circuit(&mut self, circ_id: &str) -> Result<()>;

    /// Replaces the connection with a freshly authenticated one.
    ///
    /// Any reply still pending on the old connection is discarded with it.
    async fn reconnect(&mut self) -> Result<()>;
}

/// Where a control connection was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEndpoint {
    /// Unix domain control socket.
    Socket(PathBuf),
    /// TCP control port.
    Port(SocketAddr),
}

impl ControlEndpoint {
    async fn connect(&self) -> Result<Controller> {
        let controller = match self {
            ControlEndpoint::Socket(path) => Controller::from_socket_file(path).await?,
            ControlEndpoint::Port(addr) => Controller::from_port(*addr).await?,
        };
        Ok(controller)
    }
}

impl fmt::Display for ControlEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlEndpoint::Socket(path) => write!(f, "socket {}", path.display()),
            ControlEndpoint::Port(addr) => write!(f, "control port {}", addr),
        }
    }
}

/// An authenticated stem-rs controller that can reopen itself.
///
/// Remembers the endpoint it connected to and the password that worked, so
/// [`reconnect`](ControlChannel::reconnect) never prompts twice.
pub struct TorControl {
    controller: Controller,
    endpoint: ControlEndpoint,
    password: Option<SecurePassword>,
}

impl TorControl {
    /// Connects and authenticates (see [`authenticate_any`]).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Control`] if no endpoint accepts the connection or
    /// authentication fails, and [`Error::Config`] if the configured control
    /// address is invalid.
    pub async fn connect(config: &Config) -> Result<Self> {
        let (mut controller, endpoint) = connect_to_tor(config).await?;
        let password = config.control_pass.clone().map(SecurePassword::new);
        let password = authenticate_any(&mut controller, password).await?;

        Ok(Self {
            controller,
            endpoint,
            password,
        })
    }

    /// The endpoint this connection was opened on.
    pub fn endpoint(&self) -> &ControlEndpoint {
        &self.endpoint
    }

    /// Queries Tor's version string.
    pub async fn tor_version(&mut self) -> Result<String> {
        Ok(self.controller.get_version().await?.to_string())
    }
}

#[async_trait(?Send)]
impl ControlChannel for TorControl {
    async fn get_info(&mut self, key: &str) -> Result<String> {
        Ok(self.controller.get_info(key).await?)
    }

    async fn close_circuit(&mut self, circ_id: &str) -> Result<()> {
        let circuit_id = CircuitId::new(circ_id);
        self.controller.close_circuit(&circuit_id).await?;
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<()> {
        let mut controller = self.endpoint.connect().await?;
        self.password = authenticate_any(&mut controller, self.password.clone()).await?;
        self.controller = controller;

        plog(
            LogLevel::Info,
            &format!("Reconnected to Tor via {}", self.endpoint),
        );
        Ok(())
    }
}

/// A live circuit as reported by `GETINFO circuit-status`.
///
/// # Line Format
///
/// ```text
/// <id> <status> [$fp~nick,$fp~nick,...] [BUILD_FLAGS=...] [PURPOSE=...]
///      [HS_STATE=...] [REND_QUERY=...] [TIME_CREATED=...] [REASON=...]
///      [REMOTE_REASON=...]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CircuitEntry {
    /// Circuit identifier.
    pub id: String,
    /// Circuit status (LAUNCHED, BUILT, EXTENDED, FAILED, CLOSED, ...).
    pub status: String,
    /// Relays in path order, with nicknames where Tor reported them.
    pub path: Vec<RelayHop>,
    /// Circuit purpose, e.g. `HS_CLIENT_INTRO`.
    pub purpose: Option<String>,
    /// Hidden-service state, e.g. `HSCR_JOINED`.
    pub hs_state: Option<String>,
    /// Local close/failure reason.
    pub reason: Option<String>,
    /// Remote close/failure reason.
    pub remote_reason: Option<String>,
}

/// Authenticated Tor control-port session for the duration of an audit.
///
/// The session is an explicit handle owned by the
/// [`ReachabilityChecker`](crate::ReachabilityChecker); nothing about it is
/// global. It remembers every circuit it has already retired so that a circuit
/// is never reported twice, even if Tor still lists it while it tears down.
///
/// # Release
///
/// [`close`](ControlSession::close) consumes the session. If the session is
/// dropped on an error path without `close`, [`Drop`] releases the connection
/// instead, so release happens exactly once either way.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use reachability_monitor::{Config, ControlSession};
///
/// # async fn example() -> reachability_monitor::Result<()> {
/// let mut session = ControlSession::open(&Config::default()).await?;
///
/// for circuit in session.list_circuits().await? {
///     println!("{} {:?} {:?}", circuit.id, circuit.purpose, circuit.path);
///     session.close_circuit(&circuit.id).await;
/// }
///
/// session.close();
/// # Ok(())
/// # }
/// ```
pub struct ControlSession<C: ControlChannel = TorControl> {
    channel: C,
    tor_version: String,
    retired: HashSet<String>,
    out_of_step: bool,
    closed: bool,
}

impl ControlSession<TorControl> {
    /// Opens an authenticated session to Tor's control port.
    ///
    /// # Flow
    ///
    /// 1. Connect (configured socket, configured port, `/run/tor/control`, port 9051)
    /// 2. Authenticate (see [`authenticate_any`])
    /// 3. Query the Tor version and log it
    ///
    /// # Errors
    ///
    /// Returns [`Error::Control`] if the control port is unreachable or
    /// authentication fails, and [`Error::Config`] if the configured control
    /// address is invalid. None of these are retried.
    pub async fn open(config: &Config) -> Result<Self> {
        let mut channel = TorControl::connect(config).await?;
        let version = channel.tor_version().await?;

        plog(
            LogLevel::Notice,
            &format!(
                "reachability-monitor {} connected to Tor {} using stem-rs",
                VERSION, version
            ),
        );

        Ok(Self::new(channel, version))
    }
}

impl<C: ControlChannel> ControlSession<C> {
    /// Wraps an already authenticated channel.
    pub fn new(channel: C, tor_version: impl Into<String>) -> Self {
        Self {
            channel,
            tor_version: tor_version.into(),
            retired: HashSet::new(),
            out_of_step: false,
            closed: false,
        }
    }

    /// Version string reported by Tor when the session was opened.
    pub fn tor_version(&self) -> &str {
        &self.tor_version
    }

    /// Borrows the underlying channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Returns `true` if this session already closed (or tried to close) `circ_id`.
    pub fn is_retired(&self, circ_id: &str) -> bool {
        self.retired.contains(circ_id)
    }

    async fn resync(&mut self) -> Result<()> {
        if self.out_of_step {
            plog(
                LogLevel::Notice,
                "Reopening control connection after an abandoned descriptor request",
            );
            self.channel.reconnect().await?;
            self.out_of_step = false;
        }
        Ok(())
    }

    /// Fetches the hidden service descriptor for `address`.
    ///
    /// Issues `GETINFO hs/client/desc/id/<service-id>` and waits at most
    /// `timeout` for the answer. The service id is the address without any
    /// scheme, trailing slash or `.onion` suffix.
    ///
    /// # Returns
    ///
    /// The decoded `introduction-points` block when the descriptor carries a
    /// plaintext one, otherwise the descriptor text itself.
    ///
    /// # Errors
    ///
    /// - [`Error::DescriptorUnavailable`] if Tor refuses the request, answers
    ///   with an empty descriptor, or does not answer within `timeout`
    /// - [`Error::Validation`] if `address` is not an onion service address
    /// - [`Error::Control`] if the control connection itself fails
    pub async fn fetch_service_descriptor(
        &mut self,
        address: &str,
        timeout: Duration,
    ) -> Result<String> {
        let service_id = service_id(address)?;
        let key = format!("hs/client/desc/id/{}", service_id);
        self.resync().await?;

        plog(
            LogLevel::Debug,
            &format!("Requesting descriptor for {}", service_id),
        );

        let response = match tokio::time::timeout(timeout, self.channel.get_info(&key)).await {
            Err(_) => {
                self.out_of_step = true;
                return Err(Error::DescriptorUnavailable(format!(
                    "no descriptor for {} within {}s",
                    service_id,
                    timeout.as_secs_f64()
                )));
            }
            Ok(Err(e)) => return Err(classify_descriptor_error(service_id, e)),
            Ok(Ok(response)) => response,
        };

        let descriptor = strip_info_key(&response, &key);
        if descriptor.trim().is_empty() {
            return Err(Error::DescriptorUnavailable(format!(
                "empty descriptor for {}",
                service_id
            )));
        }

        Ok(introduction_points_content(descriptor))
    }

    /// Lists live circuits, skipping any this session has already retired.
    ///
    /// # Errors
    ///
    /// Propagates control-channel failures; these are not expected during a
    /// healthy run.
    pub async fn list_circuits(&mut self) -> Result<Vec<CircuitEntry>> {
        self.resync().await?;
        let response = self.channel.get_info("circuit-status").await?;
        let circuits = parse_circuit_status(strip_info_key(&response, "circuit-status"));
        Ok(circuits
            .into_iter()
            .filter(|c| !self.retired.contains(&c.id))
            .collect())
    }

    /// Closes a circuit by identifier.
    ///
    /// Returns `true` if Tor accepted the close or the circuit was already
    /// retired by this session. Failures are logged and not propagated: the
    /// circuit may have closed on its own in the meantime. Either way the
    /// circuit is marked retired and never closed or listed again.
    pub async fn close_circuit(&mut self, circ_id: &str) -> bool {
        if !self.retired.insert(circ_id.to_string()) {
            return true;
        }

        let result = match self.resync().await {
            Ok(()) => self.channel.close_circuit(circ_id).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                plog(LogLevel::Info, &format!("Closed circuit {}", circ_id));
                true
            }
            Err(e) => {
                plog(
                    LogLevel::Info,
                    &format!("Failed to close circuit {}: {}", circ_id, e),
                );
                false
            }
        }
    }

    /// Closes the session and releases the control connection.
    pub fn close(mut self) {
        self.closed = true;
        plog(
            LogLevel::Info,
            &format!(
                "Closing control session ({} circuits closed)",
                self.retired.len()
            ),
        );
    }
}

impl<C: ControlChannel> Drop for ControlSession<C> {
    fn drop(&mut self) {
        if !self.closed {
            plog(
                LogLevel::Debug,
                "Control session dropped without close; releasing connection",
            );
        }
    }
}

/// Separates Tor declining a descriptor request from a failing connection.
fn classify_descriptor_error(service_id: &str, error: Error) -> Error {
    match error {
        Error::Control(stem_rs::Error::OperationFailed { code, message }) => {
            Error::DescriptorUnavailable(format!("{}: {} {}", service_id, code, message))
        }
        Error::Control(stem_rs::Error::DescriptorUnavailable(reason)) => {
            Error::DescriptorUnavailable(format!("{}: {}", service_id, reason))
        }
        other => other,
    }
}

/// Authenticates with Tor using any available method.
///
/// Attempts authentication in this order:
/// 1. No authentication or cookie (if the control port allows it)
/// 2. Password authentication (if provided)
/// 3. Interactive password prompt (if Tor requires a password and none was given)
///
/// Returns the password that was accepted, if one was needed.
///
/// # Errors
///
/// Returns [`Error::Control`] if authentication fails.
pub async fn authenticate_any(
    controller: &mut Controller,
    password: Option<SecurePassword>,
) -> Result<Option<SecurePassword>> {
    let result = controller
        .authenticate(password.as_ref().map(SecurePassword::as_str))
        .await;

    match result {
        Ok(()) => Ok(password),
        Err(stem_rs::Error::Authentication(stem_rs::AuthError::MissingPassword)) => {
            let passwd = SecurePassword::new(prompt_password()?);
            controller.authenticate(Some(passwd.as_str())).await?;
            Ok(Some(passwd))
        }
        Err(e) => Err(Error::Control(e)),
    }
}

fn prompt_password() -> Result<String> {
    eprint!("Controller password: ");
    let mut password = String::new();
    std::io::stdin()
        .read_line(&mut password)
        .map_err(Error::Io)?;
    Ok(password.trim().to_string())
}

/// Connects to Tor's control port.
///
/// Attempts connection in this order:
/// 1. Unix socket if configured
/// 2. TCP port if configured
/// 3. Default Unix socket /run/tor/control
/// 4. Default TCP port 9051
async fn connect_to_tor(config: &Config) -> Result<(Controller, ControlEndpoint)> {
    if let Some(ref socket_path) = config.control_socket {
        return open_endpoint(ControlEndpoint::Socket(socket_path.clone())).await;
    }

    if let Some(port) = config.control_port {
        return open_endpoint(ControlEndpoint::Port(control_addr(&config.control_ip, port)?)).await;
    }

    let default_socket = ControlEndpoint::Socket(PathBuf::from("/run/tor/control"));
    if let Ok(controller) = default_socket.connect().await {
        plog(
            LogLevel::Notice,
            &format!("Connected to Tor via {}", default_socket),
        );
        return Ok((controller, default_socket));
    }

    open_endpoint(ControlEndpoint::Port(control_addr(&config.control_ip, 9051)?)).await
}

async fn open_endpoint(endpoint: ControlEndpoint) -> Result<(Controller, ControlEndpoint)> {
    let controller = endpoint.connect().await?;
    plog(
        LogLevel::Notice,
        &format!("Connected to Tor via {}", endpoint),
    );
    Ok((controller, endpoint))
}

fn control_addr(ip: &str, port: u16) -> Result<SocketAddr> {
    format!("{}:{}", ip, port)
        .parse()
        .map_err(|e| Error::Config(format!("Invalid control address: {}", e)))
}

/// Reduces an address such as `http://abc.onion/` to the service id `abc`.
fn service_id(address: &str) -> Result<&str> {
    let id = address.trim();
    let id = id
        .strip_prefix("http://")
        .or_else(|| id.strip_prefix("https://"))
        .unwrap_or(id);
    let id = id.trim_end_matches('/');
    let id = id.strip_suffix(".onion").unwrap_or(id);

    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::Validation(format!(
            "not an onion service address: {:?}",
            address
        )));
    }
    Ok(id)
}

/// Removes a leading `<key>=` echo from a GETINFO value, if present.
fn strip_info_key<'a>(response: &'a str, key: &str) -> &'a str {
    let trimmed = response.trim_start();
    match trimmed.strip_prefix(key) {
        Some(rest) => rest.strip_prefix('=').unwrap_or(rest),
        None => response,
    }
}

/// Parses the value of `GETINFO circuit-status`.
fn parse_circuit_status(response: &str) -> Vec<CircuitEntry> {
    let mut circuits = Vec::new();

    for line in response.lines() {
        let line = line.trim();
        if line.is_empty() || line == "." || line.starts_with("250") {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }

        let mut entry = CircuitEntry {
            id: parts[0].to_string(),
            status: parts[1].to_string(),
            ..Default::default()
        };

        for part in parts.iter().skip(2) {
            if part.starts_with('$') {
                entry.path = parse_path(part);
            } else if let Some((key, value)) = part.split_once('=') {
                match key {
                    "PURPOSE" => entry.purpose = Some(value.to_string()),
                    "HS_STATE" => entry.hs_state = Some(value.to_string()),
                    "REASON" => entry.reason = Some(value.to_string()),
                    "REMOTE_REASON" => entry.remote_reason = Some(value.to_string()),
                    _ => {}
                }
            }
        }

        circuits.push(entry);
    }

    circuits
}

/// Parses a `$fp~nick,$fp=nick,$fp` path.
fn parse_path(path: &str) -> Vec<RelayHop> {
    path.split(',')
        .map(|hop| hop.trim_start_matches('$'))
        .filter_map(|hop| {
            let (fingerprint, nickname) = match hop.split_once(['~', '=']) {
                Some((fp, nick)) => (fp, Some(nick).filter(|n| !n.is_empty())),
                None => (hop, None),
            };
            (!fingerprint.is_empty()).then(|| RelayHop::new(fingerprint, nickname))
        })
        .collect()
}

/// Returns the decoded `introduction-points` block of a descriptor.
///
/// Falls back to the whole descriptor when there is no plaintext block, as
/// with v3 descriptors.
fn introduction_points_content(descriptor: &str) -> String {
    let mut lines = descriptor.lines().skip_while(|l| l.trim() != "introduction-points");

    if lines.next().is_some() && lines.next().map(str::trim) == Some("-----BEGIN MESSAGE-----") {
        let encoded: String = lines
            .take_while(|l| l.trim() != "-----END MESSAGE-----")
            .map(str::trim)
            .collect();
        if let Some(decoded) = base64_decode(&encoded) {
            return String::from_utf8_lossy(&decoded).into_owned();
        }
    }

    descriptor.trim().to_string()
}

/// Decodes the body of a descriptor's `introduction-points` MESSAGE block.
///
/// Standard alphabet, padding optional. Returns `None` on any byte outside
/// the alphabet so the caller can fall back to the raw descriptor.
fn base64_decode(input: &str) -> Option<Vec<u8>> {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    let input = input.trim_end_matches('=');
    let mut output = Vec::with_capacity(input.len() * 3 / 4);
    let mut buffer = 0u32;
    let mut bits = 0;

    for c in input.bytes() {
        let value = ALPHABET.iter().position(|&x| x == c)? as u32;
        buffer = (buffer << 6) | value;
        bits += 6;

        if bits >= 8 {
            bits -= 8;
            output.push((buffer >> bits) as u8);
            buffer &= (1 << bits) - 1;
        }
    }

    Some(output)
}
