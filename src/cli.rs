//! Shared CLI helpers and small reusable Clap fragments

use clap::Parser;
use std::path::PathBuf;

/// Daemon options used by ferryd
#[derive(Clone, Debug, Parser)]
pub struct DaemonOpts {
    /// Bind address (host:port)
    #[arg(long, default_value = "0.0.0.0:9021")]
    pub bind: String,

    /// Root directory to serve
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Append timestamped operation log lines to this file
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// Append JSONL transfer history entries to this file
    #[arg(long = "history-file")]
    pub history_file: Option<PathBuf>,
}
