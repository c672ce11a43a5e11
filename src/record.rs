//! Instance records and circuit snapshots.
//!
//! An [`InstanceRecord`] is created from a directory listing, populated in
//! place by the [`ReachabilityChecker`](crate::ReachabilityChecker), and then
//! handed read-only to the [`ResultSink`](crate::ResultSink).
//!
//! # Record Lifecycle
//!
//! ```text
//!   DirectoryReader ──▶ InstanceRecord { organization, landing_page, service_address }
//!                              │
//!                              ▼
//!   ReachabilityChecker ──▶ version = "2.5.0" | "unreachable"
//!                           intro_points   (only when unreachable)
//!                           intro_circuits (HS_CLIENT_INTRO snapshots)
//!                           rend_circuits  (HS_CLIENT_REND snapshots)
//!                              │
//!                              ▼
//!   ResultSink ──▶ results_<stamp>.json
//! ```
//!
//! # JSON Shape
//!
//! Unset optional fields are omitted so that a result file can be read back
//! and written again without change:
//!
//! ```json
//! {
//!   "organization": "Example News",
//!   "landing_page": "https://example.org/securedrop",
//!   "service_address": "exampleabcdefgh.onion",
//!   "version": "unreachable",
//!   "intro_points": "introduction-point ...",
//!   "intro_circuits": [{"path": [["AAAA...", "relay1"]], "reason": "TIMEOUT", "remote_reason": null}],
//!   "rend_circuits": []
//! }
//! ```

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Version value recorded for services that could not be reached.
pub const UNREACHABLE: &str = "unreachable";

/// Diagnostic value recorded when Tor has no descriptor for the service.
pub const DESCRIPTOR_UNAVAILABLE: &str = "descriptor unavailable";

/// Circuit purpose for client-side introduction circuits.
pub const HS_CLIENT_INTRO: &str = "HS_CLIENT_INTRO";

/// Circuit purpose for client-side rendezvous circuits.
pub const HS_CLIENT_REND: &str = "HS_CLIENT_REND";

/// One entry of the public instance directory, plus audit results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Display name of the organization running the instance.
    pub organization: String,
    /// Informational URL; never probed.
    pub landing_page: String,
    /// Onion address of the instance (the probe target).
    #[serde(alias = "ths_address")]
    pub service_address: String,
    /// Parsed version string, or [`UNREACHABLE`]. `None` until checked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Introduction-point payload or [`DESCRIPTOR_UNAVAILABLE`].
    #[serde(default, alias = "intro_pts", skip_serializing_if = "Option::is_none")]
    pub intro_points: Option<String>,
    /// Snapshots of client introduction circuits seen while checking.
    #[serde(default, alias = "intro_circs", skip_serializing_if = "Option::is_none")]
    pub intro_circuits: Option<Vec<CircuitSnapshot>>,
    /// Snapshots of client rendezvous circuits seen while checking.
    #[serde(default, alias = "rend_circs", skip_serializing_if = "Option::is_none")]
    pub rend_circuits: Option<Vec<CircuitSnapshot>>,
}

impl InstanceRecord {
    /// Creates an unchecked record from the three directory fields.
    ///
    /// # Example
    ///
    /// ```rust
    /// use reachability_monitor::InstanceRecord;
    ///
    /// let record = InstanceRecord::new("Example News", "https://example.org/sd", "abc.onion");
    /// assert!(record.version.is_none());
    /// assert!(!record.is_checked());
    /// ```
    pub fn new(
        organization: impl Into<String>,
        landing_page: impl Into<String>,
        service_address: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            landing_page: landing_page.into(),
            service_address: service_address.into(),
            ..Default::default()
        }
    }

    /// Returns `true` once a version (or the unreachable sentinel) is set.
    pub fn is_checked(&self) -> bool {
        self.version.as_deref().is_some_and(|v| !v.is_empty())
    }

    /// Returns `true` if the record was classified as unreachable.
    pub fn is_unreachable(&self) -> bool {
        self.version.as_deref() == Some(UNREACHABLE)
    }

    /// Single-line JSON rendering used for operator-visible log lines.
    pub fn to_log_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

/// One relay of a circuit path, serialized as `["<fingerprint>", "<nickname>"]`.
///
/// The nickname is `null` when Tor did not report one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayHop(pub String, pub Option<String>);

impl RelayHop {
    /// Creates a hop from a fingerprint and an optional nickname.
    pub fn new(fingerprint: impl Into<String>, nickname: Option<&str>) -> Self {
        Self(fingerprint.into(), nickname.map(str::to_string))
    }

    /// Relay fingerprint (40 hex characters).
    pub fn fingerprint(&self) -> &str {
        &self.0
    }

    /// Relay nickname, if Tor reported one.
    pub fn nickname(&self) -> Option<&str> {
        self.1.as_deref()
    }
}

/// State of a Tor circuit captured just before it was closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    /// Relays traversed, in order.
    pub path: Vec<RelayHop>,
    /// Hidden-service circuit state (rendezvous circuits only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Local close/failure reason.
    #[serde(default)]
    pub reason: Option<String>,
    /// Remote close/failure reason.
    #[serde(default)]
    pub remote_reason: Option<String>,
}

fn version_pattern(app_name: &str) -> Option<Regex> {
    static SECUREDROP: OnceLock<Option<Regex>> = OnceLock::new();
    let build = |name: &str| {
        Regex::new(&format!(r"Powered by {} ([0-9.]+)", regex::escape(name))).ok()
    };
    if app_name == "SecureDrop" {
        SECUREDROP.get_or_init(|| build(app_name)).clone()
    } else {
        build(app_name)
    }
}

/// Extracts the advertised version from a landing page body.
///
/// Looks for `Powered by <app_name> <version>.` and returns the version token
/// with trailing periods removed. Returns `None` when the pattern is absent or
/// the token contains no digits.
///
/// # Example
///
/// ```rust
/// use reachability_monitor::record::extract_version;
///
/// let body = "<footer>Powered by SecureDrop 2.5.0.</footer>";
/// assert_eq!(extract_version(body, "SecureDrop").as_deref(), Some("2.5.0"));
/// assert_eq!(extract_version("<html></html>", "SecureDrop"), None);
/// ```
pub fn extract_version(body: &str, app_name: &str) -> Option<String> {
    let captures = version_pattern(app_name)?.captures(body)?;
    let version = captures.get(1)?.as_str().trim_end_matches('.');
    if version.chars().any(|c| c.is_ascii_digit()) {
        Some(version.to_string())
    } else {
        None
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn snapshot_strategy() -> impl Strategy<Value = CircuitSnapshot> {
        (
            prop::collection::vec(
                ("[0-9A-F]{40}", prop::option::of("[A-Za-z0-9]{1,19}"))
                    .prop_map(|(fp, nick)| RelayHop(fp, nick)),
                0..4,
            ),
            prop::option::of("HSC[IR]_[A-Z_]{3,12}"),
            prop::option::of("[A-Z]{3,10}"),
            prop::option::of("[A-Z]{3,10}"),
        )
            .prop_map(|(path, state, reason, remote_reason)| CircuitSnapshot {
                path,
                state,
                reason,
                remote_reason,
            })
    }

    fn record_strategy() -> impl Strategy<Value = InstanceRecord> {
        (
            ".{0,20}",
            "https://[a-z]{1,10}\\.org",
            "[a-z2-7]{16}\\.onion",
            prop::option::of(prop_oneof![
                Just(UNREACHABLE.to_string()),
                "[0-9]\\.[0-9]{1,2}\\.[0-9]"
            ]),
            prop::option::of(".{0,40}"),
            prop::option::of(prop::collection::vec(snapshot_strategy(), 0..3)),
            prop::option::of(prop::collection::vec(snapshot_strategy(), 0..3)),
        )
            .prop_map(
                |(organization, landing_page, service_address, version, intro_points, intro_circuits, rend_circuits)| {
                    InstanceRecord {
                        organization,
                        landing_page,
                        service_address,
                        version,
                        intro_points,
                        intro_circuits,
                        rend_circuits,
                    }
                },
            )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn record_set_serialization_is_lossless(records in prop::collection::vec(record_strategy(), 0..5)) {
            let first = serde_json::to_string(&records).unwrap();
            let decoded: Vec<InstanceRecord> = serde_json::from_str(&first).unwrap();
            prop_assert_eq!(&decoded, &records);
            let second = serde_json::to_string(&decoded).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn extracted_version_is_well_formed(
            major in 0u32..10,
            minor in 0u32..20,
            patch in 0u32..20,
            prefix in "[a-z <>/]{0,30}",
        ) {
            let body = format!("{}Powered by SecureDrop {}.{}.{}.", prefix, major, minor, patch);
            let version = extract_version(&body, "SecureDrop");
            prop_assert_eq!(version, Some(format!("{}.{}.{}", major, minor, patch)));
        }
    }
}
