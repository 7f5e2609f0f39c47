// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workload execution.
//!
//! Spawns the user command as a subprocess, forwards SIGTERM/SIGINT
//! (Slurm sends these at preemption and time-limit), and collects the
//! exit status. A signal-killed workload reports 128+signal, the shell
//! convention the supervisor's exit-code contract expects.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use tokio::process::Command;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

/// Run the workload to completion, forwarding termination signals.
pub async fn run_workload(command: &[String]) -> io::Result<i32> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| io::Error::other("empty workload command"))?;

    let mut child = Command::new(program).args(args).spawn()?;
    let child_pid = child.id();
    info!(program = %program, pid = ?child_pid, "workload started");

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let status = loop {
        tokio::select! {
            status = child.wait() => break status?,
            _ = sigterm.recv() => {
                warn!("received SIGTERM, forwarding to workload");
                forward_signal(child_pid, libc::SIGTERM);
            }
            _ = sigint.recv() => {
                warn!("received SIGINT, forwarding to workload");
                forward_signal(child_pid, libc::SIGINT);
            }
        }
    };

    let code = exit_code(status);
    info!(code, "workload exited");
    Ok(code)
}

/// Normalize an exit status: real code, or 128+signal for a killed child.
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(1))
}

fn forward_signal(pid: Option<u32>, sig: i32) {
    let Some(pid) = pid else {
        return;
    };
    // SAFETY: plain kill(2) on a pid we spawned; no memory is involved.
    unsafe {
        libc::kill(pid as libc::pid_t, sig);
    }
}

#[cfg(test)]
#[path = "workload_tests.rs"]
mod tests;
