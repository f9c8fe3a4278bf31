use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use ferry::cli::DaemonOpts;
use ferry::history::TransferLog;
use ferry::logger::{Logger, NoopLogger, TextLogger};
use ferry::server::{self, ServerContext};

fn main() -> Result<()> {
    let opts = DaemonOpts::parse();

    if !opts.root.exists() {
        anyhow::bail!("Error: Root directory does not exist: {}", opts.root.display());
    }
    if !opts.root.is_dir() {
        anyhow::bail!("Error: Root path is not a directory: {}", opts.root.display());
    }

    let canonical_root = std::fs::canonicalize(&opts.root)
        .with_context(|| format!("Failed to canonicalize root path: {}", opts.root.display()))?;

    println!("Starting Ferry daemon:");
    println!("  Root: {}", canonical_root.display());
    println!("  Bind: {}", opts.bind);
    if opts.bind.starts_with("0.0.0.0") {
        eprintln!("Note: binding to 0.0.0.0 exposes the daemon to all interfaces.");
        eprintln!("The protocol is unauthenticated; only use on trusted networks.");
    }

    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted. Shutting down daemon...");
        std::process::exit(130);
    })
    .expect("Error setting Ctrl-C handler");

    let logger: Arc<dyn Logger> = if let Some(ref p) = opts.log_file {
        match TextLogger::new(p) {
            Ok(l) => Arc::new(l),
            Err(e) => {
                eprintln!("Could not open log file {}: {e}", p.display());
                Arc::new(NoopLogger)
            }
        }
    } else {
        Arc::new(NoopLogger)
    };
    let history = opts
        .history_file
        .as_deref()
        .map(|p| Arc::new(TransferLog::new(p)));

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    rt.block_on(server::serve(
        &opts.bind,
        ServerContext {
            root: canonical_root,
            logger,
            history,
        },
    ))
}
