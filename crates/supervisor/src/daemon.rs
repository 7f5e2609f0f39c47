// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup, the tick loop, shutdown.

use crate::config::SupervisorConfig;
use crate::engine::Engine;
use shepherd_core::SystemClock;
use shepherd_sched::{SlurmClient, SlurmConfig};
use shepherd_store::{BlacklistStore, PidLock, RunStore, StateLayout};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("could not determine state directory: {0}")]
    Layout(#[from] shepherd_store::LayoutError),

    #[error("failed to acquire daemon lock: supervisor already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the supervisor until SIGTERM/SIGINT.
pub async fn run() -> Result<(), DaemonError> {
    let layout = StateLayout::resolve()?;
    layout.ensure_dirs()?;
    let config = SupervisorConfig::load(&layout);

    // Rotate the log if it has outgrown its cap, then mark this startup
    // (before tracing setup, so the marker is first in the file).
    rotate_daemon_log(
        &layout.daemon_log_path(),
        config.log_rotate_bytes,
        config.log_keep_files,
    );
    write_startup_marker(&layout)?;

    let _log_guard = setup_logging(&layout)?;

    // The PID lock makes a second supervisor on the same state root fail
    // fast instead of double-driving runs.
    let pid_lock = match PidLock::acquire(&layout.daemon_pid_path()) {
        Ok(lock) => lock,
        Err(e) => {
            let pid = std::fs::read_to_string(layout.daemon_pid_path())
                .unwrap_or_default()
                .trim()
                .to_string();
            eprintln!("shepherdd is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            return Err(DaemonError::LockFailed(e));
        }
    };

    info!(
        state_root = %layout.root().display(),
        tick_period_sec = config.tick_period.as_secs(),
        worker_pool = config.worker_pool,
        "starting supervisor"
    );

    let sched = SlurmClient::new(SlurmConfig {
        call_timeout: config.call_timeout,
    });
    let engine = Engine::new(
        RunStore::new(layout.clone()),
        BlacklistStore::new(layout.clone()),
        sched,
        SystemClock,
        config.clone(),
    );

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    // NOTE: created outside the loop — select! re-evaluates branches each
    // iteration, and a sleep() inside would reset on every wakeup.
    let mut ticker = tokio::time::interval(config.tick_period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!("supervisor ready");
    println!("READY");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = engine.tick().await;
                if report.advanced + report.errors + report.quarantined > 0 {
                    tracing::debug!(?report, "tick complete");
                }
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
        }
    }

    pid_lock.release();
    info!("supervisor stopped");
    Ok(())
}

/// Age the daemon log by one generation once it outgrows the configured
/// cap: every kept rotation shifts up by one and the current log becomes
/// generation 1. Renaming onto the last generation discards it.
/// Best-effort: a failed rename must not keep the daemon down.
fn rotate_daemon_log(log_path: &Path, max_bytes: u64, keep: u32) {
    let Ok(size) = std::fs::metadata(log_path).map(|meta| meta.len()) else {
        return;
    };
    if size < max_bytes || keep == 0 {
        return;
    }
    for age in (1..=keep).rev() {
        let _ = std::fs::rename(log_generation(log_path, age - 1), log_generation(log_path, age));
    }
}

/// Path of the `age`-th rotated generation; age 0 is the live log.
fn log_generation(log_path: &Path, age: u32) -> PathBuf {
    if age == 0 {
        log_path.to_path_buf()
    } else {
        PathBuf::from(format!("{}.{age}", log_path.display()))
    }
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;

/// Startup marker, written synchronously so it is findable even if the
/// process dies before the tracing appender flushes.
fn write_startup_marker(layout: &StateLayout) -> std::io::Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(layout.daemon_log_path())?;
    writeln!(
        file,
        "--- shepherdd: starting (pid: {}) ---\n",
        std::process::id()
    )?;
    Ok(())
}

fn setup_logging(
    layout: &StateLayout,
) -> std::io::Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_path = layout.daemon_log_path();
    let dir = log_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = log_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "daemon.log".into());

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
