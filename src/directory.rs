//! Instance directory retrieval and parsing.
//!
//! The public directory is a tab-separated text resource:
//!
//! ```text
//! <header line>
//! <organization>\t<landing page>\t<onion address>[\t...]
//! ...
//! <footer line>
//! ```
//!
//! The first and last lines are discarded. The hosting CDN blocks requests
//! without a browser-like User-Agent, so one is always sent. The fetch goes
//! out directly, not through Tor.

use std::time::Duration;

use crate::config::{Config, LogLevel};
use crate::error::{Error, Result};
use crate::logger::plog;
use crate::record::InstanceRecord;

/// Fetches and parses the instance directory.
#[derive(Debug, Clone)]
pub struct DirectoryReader {
    client: reqwest::Client,
    url: String,
}

impl DirectoryReader {
    /// Creates a reader for `url` sending `user_agent`.
    pub fn new(url: impl Into<String>, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Creates a reader from the configured directory URL and User-Agent.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.directory_url.clone(),
            &config.user_agent,
            config.probe_timeout(),
        )
    }

    /// Directory URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Downloads the directory and parses it into unchecked records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on transport failure or a non-success status,
    /// and [`Error::Directory`] if the listing is malformed.
    pub async fn fetch(&self) -> Result<Vec<InstanceRecord>> {
        plog(
            LogLevel::Info,
            &format!("Fetching instance directory from {}", self.url),
        );

        let text = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let records = parse_directory(&text)?;
        plog(
            LogLevel::Notice,
            &format!("Directory lists {} instances", records.len()),
        );
        Ok(records)
    }
}

/// Parses directory text into records, in listing order.
///
/// # Errors
///
/// Returns [`Error::Directory`] naming the 1-based line number of the first
/// entry with fewer than three tab-separated fields.
///
/// # Example
///
/// ```rust
/// use reachability_monitor::directory::parse_directory;
///
/// let text = "Organization\tURL\tAddress\nExample\thttps://example.org\tabc.onion\n-- end --";
/// let records = parse_directory(text).unwrap();
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].service_address, "abc.onion");
/// ```
pub fn parse_directory(text: &str) -> Result<Vec<InstanceRecord>> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < 2 {
        return Ok(Vec::new());
    }

    let mut records = Vec::with_capacity(lines.len() - 2);

    for (index, line) in lines[1..lines.len() - 1].iter().enumerate() {
        let line_number = index + 2;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            return Err(Error::Directory(format!(
                "line {}: expected 3 tab-separated fields, found {}",
                line_number,
                fields.len()
            )));
        }

        records.push(InstanceRecord::new(
            fields[0].trim(),
            fields[1].trim(),
            fields[2].trim(),
        ));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_directory() {
        let text = "Organization\tLanding page\tAddress\n\
                    Example News\thttps://example.org/sd\taaaaaaaaaaaaaaaa.onion\n\
                    Other Org\thttps://other.example\tbbbbbbbbbbbbbbbb.onion\textra\n\
                    footer";
        let records = parse_directory(text).unwrap();
        assert_eq!(
            records,
            vec![
                InstanceRecord::new(
                    "Example News",
                    "https://example.org/sd",
                    "aaaaaaaaaaaaaaaa.onion"
                ),
                InstanceRecord::new("Other Org", "https://other.example", "bbbbbbbbbbbbbbbb.onion"),
            ]
        );
    }

    #[test]
    fn test_parse_directory_skips_blank_lines() {
        let text = "header\n\nA\tu\ta.onion\n\r\nfooter\n";
        let records = parse_directory(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].service_address, "a.onion");
    }

    #[test]
    fn test_parse_directory_crlf() {
        let text = "header\r\nA\tu\ta.onion\r\nfooter\r\n";
        let records = parse_directory(text).unwrap();
        assert_eq!(records[0].service_address, "a.onion");
    }

    #[test]
    fn test_parse_directory_short_line() {
        let text = "header\nA\tu\ta.onion\nB\tu\nfooter";
        let err = parse_directory(text).unwrap_err();
        assert!(matches!(err, Error::Directory(ref msg) if msg.starts_with("line 3:")));
    }

    #[test]
    fn test_parse_directory_header_and_footer_only() {
        assert!(parse_directory("").unwrap().is_empty());
        assert!(parse_directory("header").unwrap().is_empty());
        assert!(parse_directory("header\nfooter").unwrap().is_empty());
    }

    #[test]
    fn test_reader_from_config() {
        let config = Config::default();
        let reader = DirectoryReader::from_config(&config).unwrap();
        assert_eq!(reader.url(), config.directory_url);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn parses_every_entry_in_order(
            entries in prop::collection::vec(
                ("[A-Za-z][A-Za-z ]{0,15}[A-Za-z]", "https://[a-z]{1,10}\\.org", "[a-z2-7]{16}\\.onion"),
                0..20,
            )
        ) {
            let mut text = String::from("Organization\tURL\tAddress\n");
            for (org, url, addr) in &entries {
                text.push_str(&format!("{}\t{}\t{}\n", org, url, addr));
            }
            text.push_str("end of list\n");

            let records = parse_directory(&text).unwrap();
            prop_assert_eq!(records.len(), entries.len());
            for (record, (org, url, addr)) in records.iter().zip(&entries) {
                prop_assert_eq!(&record.organization, org);
                prop_assert_eq!(&record.landing_page, url);
                prop_assert_eq!(&record.service_address, addr);
                prop_assert!(record.version.is_none());
            }
        }
    }
}
