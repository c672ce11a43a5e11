//! Error types for reachability-monitor.
//!
//! This module defines the [`enum@Error`] enum representing the failure conditions
//! of a reachability audit. Conditions that are *expected* during an audit (a
//! SOCKS failure while probing an onion service, a missing hidden service
//! descriptor) are not surfaced through this type at the checker boundary; they
//! are folded into [`CheckOutcome`](crate::CheckOutcome) instead.
//!
//! # Error Categories
//!
//! ```text
//!   Error
//!   ├── Io                     ◄── File/network I/O failures
//!   ├── Config                 ◄── Invalid configuration
//!   ├── Control                ◄── Tor control protocol errors (from stem-rs)
//!   ├── Http                   ◄── Directory fetch failures (from reqwest)
//!   ├── Directory              ◄── Malformed directory listing
//!   ├── MalformedResponse      ◄── Probe body without a version string
//!   ├── DescriptorUnavailable  ◄── Tor has no descriptor for a service
//!   ├── Serialization          ◄── Result file encoding/decoding
//!   └── Validation             ◄── Invalid input data
//! ```
//!
//! # Recovery Guide
//!
//! | Error | Scope | Recommended Action |
//! |-------|-------|-------------------|
//! | [`Io`](Error::Io) | Run | Check permissions, disk space |
//! | [`Config`](Error::Config) | Run | Fix configuration file or flags |
//! | [`Control`](Error::Control) | Run | Check that Tor is running and the control port is reachable |
//! | [`Http`](Error::Http) | Run | Check network access to the directory host |
//! | [`Directory`](Error::Directory) | Run | The directory format changed; inspect the listing |
//! | [`MalformedResponse`](Error::MalformedResponse) | Instance | Inspect the landing page of the instance |
//! | [`DescriptorUnavailable`](Error::DescriptorUnavailable) | Instance | Recorded as a diagnostic sentinel |
//! | [`Serialization`](Error::Serialization) | Run | Check the result file |
//! | [`Validation`](Error::Validation) | Run | Fix input data |
//!
//! # Example
//!
//! ```rust
//! use reachability_monitor::{Config, Error, Result};
//!
//! fn load_config() -> Result<Config> {
//!     let config = Config::from_file(std::path::Path::new("reachability.conf"))?;
//!     config.validate()?;
//!     Ok(config)
//! }
//!
//! fn main() {
//!     match load_config() {
//!         Ok(_) => println!("Config loaded successfully"),
//!         Err(Error::Io(e)) => eprintln!("File error: {}", e),
//!         Err(Error::Config(msg)) => eprintln!("Config error: {}", msg),
//!         Err(e) => eprintln!("Other error: {}", e),
//!     }
//! }
//! ```

use thiserror::Error;

/// Errors that can occur during a reachability audit.
///
/// Session-level variants ([`Control`](Error::Control), [`Http`](Error::Http),
/// [`Directory`](Error::Directory)) abort the whole run. [`MalformedResponse`](Error::MalformedResponse)
/// aborts the instance being checked. [`DescriptorUnavailable`](Error::DescriptorUnavailable)
/// is produced by the control session and absorbed by the checker.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during file or network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    ///
    /// Not recoverable without fixing the configuration file or the
    /// command-line arguments.
    #[error("configuration error: {0}")]
    Config(String),

    /// Tor control protocol error.
    ///
    /// Wraps errors from stem-rs when connecting to, authenticating with, or
    /// talking to Tor's control port.
    #[error("Tor control error: {0}")]
    Control(#[from] stem_rs::Error),

    /// HTTP error while fetching the instance directory.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The directory listing could not be parsed.
    #[error("directory error: {0}")]
    Directory(String),

    /// A probed service answered, but the body carried no version string.
    ///
    /// This is treated as unexpected: the service is up but serving
    /// something other than the expected landing page.
    #[error("malformed response from {address}: {reason}")]
    MalformedResponse {
        /// Onion address of the probed service.
        address: String,
        /// What was wrong with the response.
        reason: String,
    },

    /// Tor has no descriptor for the requested hidden service.
    ///
    /// Also produced when the descriptor fetch exceeds its time bound.
    #[error("descriptor unavailable: {0}")]
    DescriptorUnavailable(String),

    /// Result file encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Input validation error.
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Returns `true` if this error is a missing-descriptor condition.
    pub fn is_descriptor_unavailable(&self) -> bool {
        matches!(self, Error::DescriptorUnavailable(_))
    }
}

/// Result type alias for reachability-monitor operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_response_display() {
        let err = Error::MalformedResponse {
            address: "abc.onion".to_string(),
            reason: "no version string".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "malformed response from abc.onion: no version string"
        );
    }

    #[test]
    fn test_is_descriptor_unavailable() {
        assert!(Error::DescriptorUnavailable("x".to_string()).is_descriptor_unavailable());
        assert!(!Error::Validation("x".to_string()).is_descriptor_unavailable());
    }
}
