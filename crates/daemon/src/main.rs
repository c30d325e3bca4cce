// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! agent-deckd — background process that owns the MCP socket pool, the
//! pipe-log watcher, and upstream-session-id reconciliation for the
//! terminal-agent fleet manager this crate is embedded in.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::collections::HashMap;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use tf_daemon::{env, lock, Config, Daemon, DaemonError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("agentdeckd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("agentdeckd {}", env!("CARGO_PKG_VERSION"));
                println!("Background process for the MCP socket pool and session tracker.");
                println!();
                println!("USAGE:");
                println!("    agentdeckd");
                println!();
                println!("The daemon is typically started by the fleet manager and should not");
                println!("be invoked directly.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: agentdeckd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;
    rotate_log_if_needed(&config.log_path);
    write_startup_marker(&config)?;
    let _log_guard = setup_logging(&config)?;

    info!("starting agent-deckd");

    let _lock = match lock::acquire(&config.lock_path) {
        Ok(lock) => lock,
        Err(DaemonError::LockFailed(_)) => {
            let pid = std::fs::read_to_string(&config.lock_path).unwrap_or_default();
            eprintln!("agentdeckd is already running");
            if !pid.trim().is_empty() {
                eprintln!("  pid: {}", pid.trim());
            }
            std::process::exit(1);
        }
        Err(e) => {
            error!("failed to start daemon: {e}");
            return Err(e.into());
        }
    };

    let daemon = Daemon::bootstrap(config.pool.clone())?;
    let discovered = daemon.discover_existing_sockets().await;
    if discovered > 0 {
        info!(count = discovered, "discovered existing mcp sockets");
    }

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut reconcile_tick = tokio::time::interval(env::reconcile_interval());

    info!("agent-deckd ready");
    println!("READY");

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
            _ = reconcile_tick.tick() => {
                // Nothing to reconcile until the embedding fleet manager
                // populates `daemon.instances` and supplies target ids.
                daemon.reconcile(&HashMap::new()).await;
            }
        }
    }

    daemon.shutdown().await;
    info!("agent-deckd stopped");
    Ok(())
}

/// Rotate the daemon's own log once it exceeds this size. Unrelated to the
/// pipe-pane log maintenance spec.md §1 places out of scope — this rotates
/// the daemon process's own log file, not the per-session pipe logs.
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;
const MAX_ROTATED_LOGS: usize = 3;

fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

const STARTUP_MARKER_PREFIX: &str = "--- agentdeckd: starting (pid: ";

/// Appends a startup marker before tracing is initialized, so the marker
/// is visible even if the process fails before logging comes up.
fn write_startup_marker(config: &Config) -> Result<(), std::io::Error> {
    use std::io::Write;

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(
        file,
        "{}{}) ---\n",
        STARTUP_MARKER_PREFIX,
        std::process::id()
    )
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let parent = config
        .log_path
        .parent()
        .unwrap_or_else(|| std::path::Path::new("."));
    std::fs::create_dir_all(parent)?;
    let file_name = config
        .log_path
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("agentdeckd.log"));
    let file_appender = tracing_appender::rolling::never(parent, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if tf_tracker::env::debug_enabled() { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
