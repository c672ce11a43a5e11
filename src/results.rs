//! Result file output.
//!
//! Each run writes one `results_<stamp>.json` file holding the full record
//! array, next to its `sdrm_<stamp>.log` log file. Both share the run stamp
//! produced by [`run_stamp`].

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::config::LogLevel;
use crate::error::Result;
use crate::logger::plog;
use crate::record::InstanceRecord;

/// Timestamp identifying a run, `MM-DD_HH:MM:SS` in local time.
pub fn run_stamp() -> String {
    Local::now().format("%m-%d_%H:%M:%S").to_string()
}

/// Writes the record set of a run to durable storage.
#[derive(Debug, Clone)]
pub struct ResultSink {
    path: PathBuf,
}

impl ResultSink {
    /// Creates a sink writing `<output_dir>/results_<run_stamp>.json`.
    pub fn new(output_dir: &Path, run_stamp: &str) -> Self {
        Self {
            path: output_dir.join(format!("results_{}.json", run_stamp)),
        }
    }

    /// Path of the result file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serializes `records` as a JSON array, creating the output directory
    /// if needed. An existing file is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the file cannot be written.
    pub fn write(&self, records: &[InstanceRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(records)?;
        fs::write(&self.path, json)?;

        plog(
            LogLevel::Notice,
            &format!(
                "Wrote {} records to {}",
                records.len(),
                self.path.display()
            ),
        );
        Ok(())
    }
}

/// Loads a result file written by [`ResultSink::write`].
///
/// Files using the older `ths_address`, `intro_pts`, `intro_circs` and
/// `rend_circs` field names are accepted.
pub fn read_results(path: &Path) -> Result<Vec<InstanceRecord>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
