//! reachability-monitor CLI application entry point.
//!
//! This binary runs one reachability audit of the SecureDrop directory through
//! a local Tor instance and exits.
//!
//! # Startup Flow
//!
//! ```text
//!   ┌──────────────────┐
//!   │  Parse CLI Args  │ ◄── clap parses command-line arguments
//!   └────────┬─────────┘
//!            │
//!            ▼
//!   ┌──────────────────┐       ┌─────────────────┐
//!   │ --generate_config│──────▶│ Write default   │────▶ Exit
//!   │    specified?    │       │ config & exit   │
//!   └────────┬─────────┘       └─────────────────┘
//!            │ No
//!            ▼
//!   ┌──────────────────┐
//!   │  Load Config     │ ◄── Defaults → File → CLI
//!   └────────┬─────────┘
//!            │
//!            ▼
//!   ┌──────────────────┐
//!   │ Initialize       │ ◄── logs/sdrm_<stamp>.log unless --logfile
//!   │   Logging        │
//!   └────────┬─────────┘
//!            │
//!            ▼
//!   ┌──────────────────┐
//!   │ Run Audit        │ ◄── api::run_main() writes logs/results_<stamp>.json
//!   └────────┬─────────┘
//!            │
//!            ▼
//!   ┌──────────────────┐
//!   │  Exit with       │
//!   │  status code     │
//!   └──────────────────┘
//! ```
//!
//! # Usage Examples
//!
//! ```bash
//! # Audit with defaults
//! reachability-monitor
//!
//! # Connect to a specific control port, log to stdout
//! reachability-monitor --control-port 9051 --logfile -
//!
//! # Generate a default configuration file
//! reachability-monitor --generate_config reachability.conf
//! ```
//!
//! # Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Audit completed and results written |
//! | 1 | Error (see stderr and the run log for details) |
//!
//! # Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `REACHABILITY_CONFIG` | Path to config file (equivalent to `--config`) |
//! | `REACHABILITY_OUTPUT_DIR` | Output directory (equivalent to `--output-dir`) |
//! | `RUST_LOG` | Overrides the configured log level |

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use reachability_monitor::{api, config, logger, plog_fmt, results, CliArgs, Config, LogLevel};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> reachability_monitor::Result<()> {
    let args = CliArgs::parse();

    if let Some(ref output_path) = args.generate_config {
        let config = Config::default();
        let toml = config.to_toml()?;
        std::fs::write(output_path, toml)?;
        println!("Wrote default config to {}", output_path.display());
        return Ok(());
    }

    let config = config::load_config(&args)?;
    let run_stamp = results::run_stamp();

    let logfile = match config.logfile.as_deref() {
        Some("-") => None,
        Some(path) => Some(PathBuf::from(path)),
        None => Some(logger::run_log_path(&config.output_dir, &run_stamp)),
    };
    logger::init(config.loglevel, logfile.as_deref())?;

    logger::plog(
        LogLevel::Debug,
        &format!("Control IP: {}", config.control_ip),
    );
    logger::plog(
        LogLevel::Debug,
        &format!("SOCKS proxy: {}", config.socks_proxy),
    );
    plog_fmt!(
        LogLevel::Info,
        "Probe timeout {}s, descriptor timeout {}s",
        config.probe_timeout_secs,
        config.descriptor_timeout_secs
    );

    api::run_main(config, &run_stamp).await
}
