//! Per-instance reachability checks.
//!
//! The [`ReachabilityChecker`] probes each instance's landing page through the
//! Tor SOCKS proxy, classifies the result, and attaches control-port
//! diagnostics to the [`InstanceRecord`].
//!
//! # Check Protocol
//!
//! ```text
//!   probe http://<address>/ via SOCKS (probe timeout)
//!        │
//!        ├── body ──────▶ extract "Powered by <app> <version>."
//!        │                    ├── found ──▶ version = <version>
//!        │                    └── absent ─▶ Error::MalformedResponse (run aborts)
//!        │
//!        └── failure ───▶ version = "unreachable"
//!                         fetch descriptor (descriptor timeout)
//!                             ├── ok ───────────▶ intro_points = <payload>
//!                             └── unavailable ──▶ intro_points = "descriptor unavailable"
//!                                                 log record, stop here
//!        │
//!        ▼
//!   list circuits ─▶ snapshot HS_CLIENT_INTRO / HS_CLIENT_REND, close every circuit
//!        │
//!        ▼
//!   log record if unreachable
//! ```
//!
//! # Circuit Attribution
//!
//! Circuits are a process-wide resource. Circuit collection observes and
//! closes *every* circuit Tor lists at that moment, so a snapshot may belong to
//! an earlier probe whose circuit outlived it. Snapshots are attributed to the
//! instance being checked when they are collected; no per-instance correlation
//! is attempted. The session guarantees a circuit is snapshotted at most once.
//!
//! # Example
//!
//! ```rust,no_run
//! use reachability_monitor::{
//!     CheckSettings, Config, ControlSession, InstanceRecord, ReachabilityChecker, SocksProber,
//! };
//!
//! # async fn example() -> reachability_monitor::Result<()> {
//! let config = Config::default();
//! let session = ControlSession::open(&config).await?;
//! let prober = SocksProber::new(&config.socks_proxy, &config.user_agent)?;
//! let mut checker = ReachabilityChecker::new(prober, session, CheckSettings::from(&config));
//!
//! let mut records = vec![InstanceRecord::new("Example", "https://example.org", "abc.onion")];
//! checker.check_all(&mut records).await?;
//! checker.into_session().close();
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;

use crate::config::{Config, LogLevel};
use crate::control::{ControlChannel, ControlSession, TorControl};
use crate::error::{Error, Result};
use crate::logger::plog;
use crate::record::{
    extract_version, CircuitSnapshot, InstanceRecord, DESCRIPTOR_UNAVAILABLE, HS_CLIENT_INTRO,
    HS_CLIENT_REND, UNREACHABLE,
};

/// Result of a single probe attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// The service answered; the response body.
    Body(String),
    /// Proxy negotiation, network, or HTTP failure; a description of it.
    Failed(String),
}

/// Fetches a landing page from an onion service.
#[async_trait(?Send)]
pub trait Prober {
    /// Fetches `http://<address>/`, giving up after `timeout`.
    ///
    /// Transport failures are expected and reported as
    /// [`FetchResult::Failed`]; `Err` is reserved for conditions that should
    /// abort the run.
    async fn fetch(&self, address: &str, timeout: Duration) -> Result<FetchResult>;
}

/// [`Prober`] routing requests through Tor's SOCKS port.
///
/// Host names are resolved by Tor (`socks5h`), which onion addresses require.
#[derive(Debug, Clone)]
pub struct SocksProber {
    client: reqwest::Client,
}

impl SocksProber {
    /// Creates a prober using the SOCKS proxy at `socks_proxy` (`host:port`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the proxy URL is rejected or the HTTP client
    /// cannot be built.
    pub fn new(socks_proxy: &str, user_agent: &str) -> Result<Self> {
        let proxy = reqwest::Proxy::all(format!("socks5h://{}", socks_proxy))?;
        let client = reqwest::Client::builder()
            .proxy(proxy)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait(?Send)]
impl Prober for SocksProber {
    async fn fetch(&self, address: &str, timeout: Duration) -> Result<FetchResult> {
        let url = probe_url(address);

        let response = match self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(response) => response,
            Err(e) => return Ok(FetchResult::Failed(e.to_string())),
        };

        match response.text().await {
            Ok(body) => Ok(FetchResult::Body(body)),
            Err(e) => Ok(FetchResult::Failed(e.to_string())),
        }
    }
}

/// Builds the probe URL for an onion address.
fn probe_url(address: &str) -> String {
    let host = address.trim();
    let host = host
        .strip_prefix("http://")
        .or_else(|| host.strip_prefix("https://"))
        .unwrap_or(host);
    format!("http://{}/", host.trim_end_matches('/'))
}

/// Classification of one instance check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The landing page advertised this version.
    Reached(String),
    /// The probe failed; descriptor diagnostics were collected.
    Unreachable,
    /// The probe failed and Tor had no descriptor for the service.
    DiagnosticUnavailable,
}

/// Timing and matching parameters for a check run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSettings {
    /// Application name in the version pattern.
    pub app_name: String,
    /// Bound on each landing page probe.
    pub probe_timeout: Duration,
    /// Bound on each descriptor fetch.
    pub descriptor_timeout: Duration,
}

impl Default for CheckSettings {
    fn default() -> Self {
        CheckSettings::from(&Config::default())
    }
}

impl From<&Config> for CheckSettings {
    fn from(config: &Config) -> Self {
        Self {
            app_name: config.app_name.clone(),
            probe_timeout: config.probe_timeout(),
            descriptor_timeout: config.descriptor_timeout(),
        }
    }
}

/// Per-run tally of outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckSummary {
    /// Instances that advertised a version.
    pub reached: usize,
    /// Unreachable instances with descriptor diagnostics.
    pub unreachable: usize,
    /// Unreachable instances without a descriptor.
    pub diagnostic_unavailable: usize,
}

impl CheckSummary {
    fn record(&mut self, outcome: &CheckOutcome) {
        match outcome {
            CheckOutcome::Reached(_) => self.reached += 1,
            CheckOutcome::Unreachable => self.unreachable += 1,
            CheckOutcome::DiagnosticUnavailable => self.diagnostic_unavailable += 1,
        }
    }

    /// Total number of instances checked.
    pub fn total(&self) -> usize {
        self.reached + self.unreachable + self.diagnostic_unavailable
    }
}

/// Probes instances one at a time and attaches diagnostics.
///
/// Owns the [`ControlSession`] for the duration of the run. Instances are
/// processed strictly in order; there is no concurrent probing.
pub struct ReachabilityChecker<P: Prober = SocksProber, C: ControlChannel = TorControl> {
    prober: P,
    session: ControlSession<C>,
    settings: CheckSettings,
}

impl<P: Prober, C: ControlChannel> ReachabilityChecker<P, C> {
    /// Creates a checker from a prober, an open session and settings.
    pub fn new(prober: P, session: ControlSession<C>, settings: CheckSettings) -> Self {
        Self {
            prober,
            session,
            settings,
        }
    }

    /// Returns the settings in use.
    pub fn settings(&self) -> &CheckSettings {
        &self.settings
    }

    /// Borrows the control session.
    pub fn session(&self) -> &ControlSession<C> {
        &self.session
    }

    /// Gives the control session back, typically to close it.
    pub fn into_session(self) -> ControlSession<C> {
        self.session
    }

    /// Checks every record in order.
    ///
    /// Stops at the first unexpected error. Records checked before the error
    /// keep their results; later records are left unchecked.
    ///
    /// # Errors
    ///
    /// See [`check_instance`](Self::check_instance).
    pub async fn check_all(&mut self, records: &mut [InstanceRecord]) -> Result<CheckSummary> {
        let mut summary = CheckSummary::default();
        let count = records.len();

        for (index, record) in records.iter_mut().enumerate() {
            plog(
                LogLevel::Info,
                &format!(
                    "[{}/{}] Checking {} ({})",
                    index + 1,
                    count,
                    record.organization,
                    record.service_address
                ),
            );
            let outcome = self.check_instance(record).await?;
            summary.record(&outcome);
        }

        plog(
            LogLevel::Notice,
            &format!(
                "Checked {} instances: {} reachable, {} unreachable, {} without descriptor",
                summary.total(),
                summary.reached,
                summary.unreachable,
                summary.diagnostic_unavailable
            ),
        );

        Ok(summary)
    }

    /// Checks one instance and populates `record` in place.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedResponse`] if the service answered without a
    ///   version string
    /// - Control-channel failures other than a missing descriptor
    pub async fn check_instance(&mut self, record: &mut InstanceRecord) -> Result<CheckOutcome> {
        let address = record.service_address.clone();

        let outcome = match self
            .prober
            .fetch(&address, self.settings.probe_timeout)
            .await?
        {
            FetchResult::Body(body) => {
                let version = extract_version(&body, &self.settings.app_name).ok_or_else(|| {
                    Error::MalformedResponse {
                        address: address.clone(),
                        reason: format!("no \"Powered by {}\" version string", self.settings.app_name),
                    }
                })?;
                plog(
                    LogLevel::Info,
                    &format!("{} is running version {}", address, version),
                );
                record.version = Some(version.clone());
                CheckOutcome::Reached(version)
            }
            FetchResult::Failed(reason) => {
                plog(
                    LogLevel::Info,
                    &format!("{} unreachable: {}", address, reason),
                );
                record.version = Some(UNREACHABLE.to_string());

                match self
                    .session
                    .fetch_service_descriptor(&address, self.settings.descriptor_timeout)
                    .await
                {
                    Ok(intro_points) => {
                        record.intro_points = Some(intro_points);
                        CheckOutcome::Unreachable
                    }
                    Err(e) if e.is_descriptor_unavailable() => {
                        plog(LogLevel::Debug, &e.to_string());
                        record.intro_points = Some(DESCRIPTOR_UNAVAILABLE.to_string());
                        plog(LogLevel::Notice, &record.to_log_line());
                        return Ok(CheckOutcome::DiagnosticUnavailable);
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        self.collect_circuits(record).await?;

        if record.is_unreachable() {
            plog(LogLevel::Notice, &record.to_log_line());
        }

        Ok(outcome)
    }

    /// Snapshots client HS circuits into `record` and closes every listed circuit.
    async fn collect_circuits(&mut self, record: &mut InstanceRecord) -> Result<()> {
        let circuits = self.session.list_circuits().await?;

        let mut intro_circuits = Vec::new();
        let mut rend_circuits = Vec::new();

        for circuit in circuits {
            match circuit.purpose.as_deref() {
                Some(HS_CLIENT_INTRO) => intro_circuits.push(CircuitSnapshot {
                    path: circuit.path,
                    state: None,
                    reason: circuit.reason,
                    remote_reason: circuit.remote_reason,
                }),
                Some(HS_CLIENT_REND) => rend_circuits.push(CircuitSnapshot {
                    path: circuit.path,
                    state: circuit.hs_state,
                    reason: circuit.reason,
                    remote_reason: circuit.remote_reason,
                }),
                _ => {}
            }
            self.session.close_circuit(&circuit.id).await;
        }

        plog(
            LogLevel::Debug,
            &format!(
                "Collected {} intro and {} rend circuits for {}",
                intro_circuits.len(),
                rend_circuits.len(),
                record.service_address
            ),
        );

        record.intro_circuits = Some(intro_circuits);
        record.rend_circuits = Some(rend_circuits);
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockProber;
    use super::*;
    use crate::control::mock::MockChannel;
    use crate::logger::capture::LogCapture;
    use crate::record::RelayHop;

    const ADDR: &str = "abcdefghijklmnop.onion";
    const INTRO_LINE: &str = "3 BUILT $AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA~a,$BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB~b PURPOSE=HS_CLIENT_INTRO HS_STATE=HSCI_DONE REASON=FINISHED";
    const REND_LINE: &str = "4 BUILT $CCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC~c PURPOSE=HS_CLIENT_REND HS_STATE=HSCR_JOINED REMOTE_REASON=DESTROYED";
    const GENERAL_LINE: &str = "5 BUILT $DDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDD~d PURPOSE=GENERAL";

    fn settings() -> CheckSettings {
        CheckSettings {
            app_name: "SecureDrop".to_string(),
            probe_timeout: Duration::from_secs(30),
            descriptor_timeout: Duration::from_millis(200),
        }
    }

    fn checker(
        prober: MockProber,
        channel: MockChannel,
    ) -> ReachabilityChecker<MockProber, MockChannel> {
        ReachabilityChecker::new(prober, ControlSession::new(channel, "0.4.8.12"), settings())
    }

    fn record() -> InstanceRecord {
        InstanceRecord::new("Example News", "https://example.org/securedrop", ADDR)
    }

    #[test]
    fn test_probe_url() {
        assert_eq!(probe_url("abc.onion"), "http://abc.onion/");
        assert_eq!(probe_url("http://abc.onion/"), "http://abc.onion/");
        assert_eq!(probe_url(" abc.onion "), "http://abc.onion/");
    }

    #[test]
    fn test_socks_prober_builds() {
        assert!(SocksProber::new("127.0.0.1:9050", "test-agent").is_ok());
    }

    #[tokio::test]
    async fn test_reachable_instance_records_version() {
        let prober = MockProber::with(
            ADDR,
            FetchResult::Body("<footer>Powered by SecureDrop 2.5.0.</footer>".to_string()),
        );
        let mut checker = checker(prober, MockChannel::default());
        let mut record = record();

        let outcome = checker.check_instance(&mut record).await.unwrap();

        assert_eq!(outcome, CheckOutcome::Reached("2.5.0".to_string()));
        assert_eq!(record.version.as_deref(), Some("2.5.0"));
        assert!(record.intro_points.is_none());
        assert_eq!(record.intro_circuits, Some(vec![]));
        assert_eq!(record.rend_circuits, Some(vec![]));
        assert_eq!(checker.session().channel().descriptor_requests(), 0);
    }

    #[tokio::test]
    async fn test_probe_uses_configured_timeout() {
        let prober = MockProber::with(
            ADDR,
            FetchResult::Body("Powered by SecureDrop 2.5.0.".to_string()),
        );
        let mut checker = checker(prober, MockChannel::default());
        checker.check_instance(&mut record()).await.unwrap();
        assert_eq!(
            checker.prober.calls.borrow().as_slice(),
            &[(ADDR.to_string(), Duration::from_secs(30))]
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_an_error() {
        let prober = MockProber::with(ADDR, FetchResult::Body("<html>hello</html>".to_string()));
        let mut checker = checker(prober, MockChannel::default());
        let mut record = record();

        let err = checker.check_instance(&mut record).await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { ref address, .. } if address == ADDR));
        assert!(record.version.is_none());
    }

    #[tokio::test]
    async fn test_socks_failure_is_unreachable_and_fetches_descriptor() {
        let prober = MockProber::with(
            ADDR,
            FetchResult::Failed("SOCKS5 connection refused".to_string()),
        );
        let mut channel = MockChannel::default();
        channel.descriptors.insert(
            "abcdefghijklmnop".to_string(),
            "hs-descriptor 3\nrevision-counter 7\n".to_string(),
        );
        let mut checker = checker(prober, channel);
        let mut record = record();

        let outcome = checker.check_instance(&mut record).await.unwrap();

        assert_eq!(outcome, CheckOutcome::Unreachable);
        assert_eq!(record.version.as_deref(), Some(UNREACHABLE));
        assert_eq!(
            record.intro_points.as_deref(),
            Some("hs-descriptor 3\nrevision-counter 7")
        );
        assert_eq!(checker.session().channel().descriptor_requests(), 1);
        assert_eq!(record.intro_circuits, Some(vec![]));
    }

    #[tokio::test]
    async fn test_descriptor_unavailable_skips_circuits() {
        let prober = MockProber::with(
            ADDR,
            FetchResult::Failed("SOCKS5 connection refused".to_string()),
        );
        let channel = MockChannel::with_circuits(&[INTRO_LINE, REND_LINE]);
        let mut checker = checker(prober, channel);
        let mut record = record();

        let outcome = checker.check_instance(&mut record).await.unwrap();

        assert_eq!(outcome, CheckOutcome::DiagnosticUnavailable);
        assert_eq!(record.version.as_deref(), Some(UNREACHABLE));
        assert_eq!(record.intro_points.as_deref(), Some(DESCRIPTOR_UNAVAILABLE));
        assert!(record.intro_circuits.is_none());
        assert!(record.rend_circuits.is_none());
        assert!(checker.session().channel().closed.is_empty());
        assert!(!checker
            .session()
            .channel()
            .info_requests
            .contains(&"circuit-status".to_string()));
    }

    #[tokio::test]
    async fn test_descriptor_timeout_is_unavailable() {
        let prober = MockProber::with(ADDR, FetchResult::Failed("timed out".to_string()));
        let mut channel = MockChannel::default();
        channel.stalled.push("abcdefghijklmnop".to_string());
        let mut checker = checker(prober, channel);
        let mut record = record();

        let outcome = checker.check_instance(&mut record).await.unwrap();
        assert_eq!(outcome, CheckOutcome::DiagnosticUnavailable);
        assert_eq!(record.intro_points.as_deref(), Some(DESCRIPTOR_UNAVAILABLE));
    }

    #[tokio::test]
    async fn test_intro_and_rend_circuits_snapshotted_and_closed() {
        let prober = MockProber::with(
            ADDR,
            FetchResult::Body("Powered by SecureDrop 2.6.1.".to_string()),
        );
        let channel = MockChannel::with_circuits(&[INTRO_LINE, REND_LINE]);
        let mut checker = checker(prober, channel);
        let mut record = record();

        checker.check_instance(&mut record).await.unwrap();

        assert_eq!(
            record.intro_circuits,
            Some(vec![CircuitSnapshot {
                path: vec![
                    RelayHop::new("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", Some("a")),
                    RelayHop::new("BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB", Some("b")),
                ],
                state: None,
                reason: Some("FINISHED".to_string()),
                remote_reason: None,
            }])
        );
        assert_eq!(
            record.rend_circuits,
            Some(vec![CircuitSnapshot {
                path: vec![RelayHop::new("CCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC", Some("c"))],
                state: Some("HSCR_JOINED".to_string()),
                reason: None,
                remote_reason: Some("DESTROYED".to_string()),
            }])
        );
        assert_eq!(
            checker.session().channel().closed,
            vec!["3".to_string(), "4".to_string()]
        );
    }

    #[tokio::test]
    async fn test_all_listed_circuits_are_closed() {
        let prober = MockProber::with(
            ADDR,
            FetchResult::Body("Powered by SecureDrop 2.6.1.".to_string()),
        );
        let channel = MockChannel::with_circuits(&[GENERAL_LINE, INTRO_LINE]);
        let mut checker = checker(prober, channel);
        let mut record = record();

        checker.check_instance(&mut record).await.unwrap();

        assert_eq!(record.intro_circuits.as_ref().map(Vec::len), Some(1));
        assert_eq!(record.rend_circuits, Some(vec![]));
        assert_eq!(
            checker.session().channel().closed,
            vec!["5".to_string(), "3".to_string()]
        );
    }

    #[tokio::test]
    async fn test_circuit_collection_on_empty_set_is_noop() {
        let mut checker = checker(MockProber::default(), MockChannel::default());

        for _ in 0..2 {
            let mut record = record();
            checker.collect_circuits(&mut record).await.unwrap();
            assert_eq!(record.intro_circuits, Some(vec![]));
            assert_eq!(record.rend_circuits, Some(vec![]));
        }
        assert!(checker.session().channel().closed.is_empty());
    }

    #[tokio::test]
    async fn test_circuit_never_snapshotted_twice() {
        let mut channel = MockChannel::with_circuits(&[INTRO_LINE]);
        channel.fail_close.push("3".to_string());
        let mut checker = checker(MockProber::default(), channel);

        let mut first = record();
        checker.collect_circuits(&mut first).await.unwrap();
        let mut second = record();
        checker.collect_circuits(&mut second).await.unwrap();

        assert_eq!(first.intro_circuits.as_ref().map(Vec::len), Some(1));
        assert_eq!(second.intro_circuits, Some(vec![]));
    }

    #[tokio::test]
    async fn test_control_failure_propagates() {
        let prober = MockProber::with(
            ADDR,
            FetchResult::Body("Powered by SecureDrop 2.5.0.".to_string()),
        );
        let mut channel = MockChannel::default();
        channel.broken = true;
        let mut checker = checker(prober, channel);

        let err = checker.check_instance(&mut record()).await.unwrap_err();
        assert!(matches!(err, Error::Control(stem_rs::Error::Socket(_))));
    }

    #[tokio::test]
    async fn test_lost_control_connection_is_not_a_missing_descriptor() {
        let prober = MockProber::with(
            ADDR,
            FetchResult::Failed("SOCKS5 connection refused".to_string()),
        );
        let mut channel = MockChannel::with_circuits(&[INTRO_LINE]);
        channel.disconnected = true;
        let mut checker = checker(prober, channel);
        let mut record = record();

        let err = checker.check_instance(&mut record).await.unwrap_err();

        assert!(matches!(err, Error::Control(stem_rs::Error::SocketClosed)));
        assert_eq!(record.version.as_deref(), Some(UNREACHABLE));
        assert!(record.intro_points.is_none());
        assert!(record.intro_circuits.is_none());
    }

    #[tokio::test]
    async fn test_circuits_listed_after_descriptor_timeout() {
        let mut prober = MockProber::default();
        prober.responses.insert(
            "bbbbbbbbbbbbbbbb.onion".to_string(),
            FetchResult::Body("Powered by SecureDrop 2.5.0.".to_string()),
        );
        let mut channel = MockChannel::with_circuits(&[REND_LINE]);
        channel.stalled.push("aaaaaaaaaaaaaaaa".to_string());
        let mut checker = checker(prober, channel);

        let mut records = vec![
            InstanceRecord::new("A", "https://a.example", "aaaaaaaaaaaaaaaa.onion"),
            InstanceRecord::new("B", "https://b.example", "bbbbbbbbbbbbbbbb.onion"),
        ];
        checker.check_all(&mut records).await.unwrap();

        assert_eq!(records[0].intro_points.as_deref(), Some(DESCRIPTOR_UNAVAILABLE));
        assert_eq!(records[1].rend_circuits.as_ref().map(Vec::len), Some(1));
        assert_eq!(checker.session().channel().reconnects, 1);
        assert_eq!(checker.session().channel().closed, vec!["4".to_string()]);
    }

    fn operator_lines(log: &str, address: &str) -> usize {
        let needle = format!("\"service_address\":\"{}\"", address);
        log.lines().filter(|line| line.contains(&needle)).count()
    }

    #[tokio::test]
    async fn test_operator_log_line_per_unreachable_record() {
        let capture = LogCapture::default();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        let mut prober = MockProber::default();
        prober.responses.insert(
            "aaaaaaaaaaaaaaaa.onion".to_string(),
            FetchResult::Body("Powered by SecureDrop 2.5.0.".to_string()),
        );
        let mut channel = MockChannel::with_circuits(&[INTRO_LINE]);
        channel
            .descriptors
            .insert("bbbbbbbbbbbbbbbb".to_string(), "hs-descriptor 3".to_string());
        let mut checker = checker(prober, channel);

        let mut records = vec![
            InstanceRecord::new("A", "https://a.example", "aaaaaaaaaaaaaaaa.onion"),
            InstanceRecord::new("B", "https://b.example", "bbbbbbbbbbbbbbbb.onion"),
            InstanceRecord::new("C", "https://c.example", "cccccccccccccccc.onion"),
        ];
        checker.check_all(&mut records).await.unwrap();

        let log = capture.contents();
        assert_eq!(operator_lines(&log, "aaaaaaaaaaaaaaaa.onion"), 0);
        assert_eq!(operator_lines(&log, "bbbbbbbbbbbbbbbb.onion"), 1);
        assert_eq!(operator_lines(&log, "cccccccccccccccc.onion"), 1);
        assert!(log.contains(&records[1].to_log_line()));
        assert!(log.contains(&records[2].to_log_line()));
        assert!(log
            .lines()
            .filter(|line| line.contains("bbbbbbbbbbbbbbbb.onion") && line.contains("service_address"))
            .all(|line| line.contains("INFO")));
    }

    #[tokio::test]
    async fn test_check_all_stops_at_first_error() {
        let mut prober = MockProber::default();
        prober.responses.insert(
            "aaaaaaaaaaaaaaaa.onion".to_string(),
            FetchResult::Body("Powered by SecureDrop 2.5.0.".to_string()),
        );
        prober.responses.insert(
            "bbbbbbbbbbbbbbbb.onion".to_string(),
            FetchResult::Body("not a landing page".to_string()),
        );
        let mut checker = checker(prober, MockChannel::default());

        let mut records = vec![
            InstanceRecord::new("A", "https://a.example", "aaaaaaaaaaaaaaaa.onion"),
            InstanceRecord::new("B", "https://b.example", "bbbbbbbbbbbbbbbb.onion"),
            InstanceRecord::new("C", "https://c.example", "cccccccccccccccc.onion"),
        ];

        let err = checker.check_all(&mut records).await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
        assert_eq!(records[0].version.as_deref(), Some("2.5.0"));
        assert!(records[1].version.is_none());
        assert!(records[2].version.is_none());
        assert_eq!(checker.prober.calls.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_check_all_summary() {
        let mut prober = MockProber::default();
        prober.responses.insert(
            "aaaaaaaaaaaaaaaa.onion".to_string(),
            FetchResult::Body("Powered by SecureDrop 2.5.0.".to_string()),
        );
        let mut channel = MockChannel::default();
        channel
            .descriptors
            .insert("bbbbbbbbbbbbbbbb".to_string(), "hs-descriptor 3".to_string());
        let mut checker = checker(prober, channel);

        let mut records = vec![
            InstanceRecord::new("A", "https://a.example", "aaaaaaaaaaaaaaaa.onion"),
            InstanceRecord::new("B", "https://b.example", "bbbbbbbbbbbbbbbb.onion"),
            InstanceRecord::new("C", "https://c.example", "cccccccccccccccc.onion"),
        ];

        let summary = checker.check_all(&mut records).await.unwrap();
        assert_eq!(
            summary,
            CheckSummary {
                reached: 1,
                unreachable: 1,
                diagnostic_unavailable: 1
            }
        );
        assert!(records.iter().all(InstanceRecord::is_checked));
        assert!(records[1].intro_points.is_some());
        assert_eq!(records[2].intro_points.as_deref(), Some(DESCRIPTOR_UNAVAILABLE));
    }
}
