//! CLI argument definitions for logsentinel-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.
//! Every override flag takes precedence over both the config file
//! and `LOGSENTINEL_*` environment variables.

use std::path::PathBuf;

use clap::Parser;

/// Default configuration file location.
///
/// If this path does not exist the daemon starts from built-in defaults
/// plus environment overrides. An explicitly given path must exist.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/logsentinel/logsentinel.toml";

/// logsentinel log monitoring daemon.
///
/// Periodically scans a directory tree for `.log` files, sends newly
/// appended content to an external analysis engine and raises an alert
/// when the verdict mentions a trigger term.
#[derive(Parser, Debug)]
#[command(name = "logsentinel-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to logsentinel.toml configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override the root directory scanned for log files.
    #[arg(long)]
    pub log_dir: Option<String>,

    /// Override the pause between passes, in seconds.
    #[arg(long)]
    pub interval_secs: Option<u64>,

    /// Override the maximum number of trailing lines analyzed per file.
    #[arg(long)]
    pub max_lines: Option<usize>,

    /// Run a single pass and exit.
    #[arg(long)]
    pub once: bool,

    /// Validate configuration and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Whether `--config` still points at the built-in default location.
    pub fn uses_default_config_path(&self) -> bool {
        self.config == std::path::Path::new(DEFAULT_CONFIG_PATH)
    }
}
