// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Preflight probes.
//!
//! Run before the workload so a broken node fails fast with a
//! node-implicating exit code instead of wasting the allocation. Each
//! probe runs under its own wall-clock budget. The trespasser probe only
//! observes; it never touches foreign processes.

use shepherd_core::{FailureKind, EXIT_CUDA_FAILURE, EXIT_NODE_FAULT, EXIT_TRESPASSER};
use std::os::unix::fs::MetadataExt;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

/// Default CUDA smoke test: allocate a small device tensor, run a trivial
/// kernel, synchronize.
const DEFAULT_CUDA_SMOKE: &str = "python -c \"import torch; x = torch.ones(1024, device='cuda'); y = (x * 2).sum(); torch.cuda.synchronize(); assert int(y.item()) == 2048\"";

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub probe_timeout: Duration,
    pub expected_gpus: Option<usize>,
    pub cuda_smoke_cmd: Option<String>,
}

/// A probe verdict that must abort the wrapper.
#[derive(Debug, Clone)]
pub struct ProbeFailure {
    pub exit_code: i32,
    pub kind: FailureKind,
    pub detail: String,
}

impl ProbeFailure {
    fn new(exit_code: i32, detail: impl Into<String>) -> Self {
        Self {
            exit_code,
            kind: FailureKind::from_exit_code(exit_code),
            detail: detail.into(),
        }
    }
}

/// Run all probes in contract order. First failure wins.
pub async fn run_preflight(config: &ProbeConfig) -> Result<(), ProbeFailure> {
    let visible = gpu_visibility(config).await?;
    cuda_smoke(config).await?;
    mig_sanity(config, visible)?;
    trespasser_scan(config).await?;
    Ok(())
}

/// Enumerate visible GPUs; zero devices or an enumeration error is a node
/// fault.
async fn gpu_visibility(config: &ProbeConfig) -> Result<usize, ProbeFailure> {
    let mut cmd = Command::new("nvidia-smi");
    cmd.arg("-L");
    let output = run_probe(cmd, config.probe_timeout, "nvidia-smi -L")
        .await
        .map_err(|e| ProbeFailure::new(EXIT_NODE_FAULT, e))?;

    if !output.status.success() {
        return Err(ProbeFailure::new(
            EXIT_NODE_FAULT,
            format!(
                "nvidia-smi -L failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }

    let count = parse_gpu_list(&String::from_utf8_lossy(&output.stdout));
    if count == 0 {
        return Err(ProbeFailure::new(
            EXIT_NODE_FAULT,
            "nvidia-smi enumerated 0 devices",
        ));
    }
    info!(gpus = count, "gpu visibility probe passed");
    Ok(count)
}

/// Launch a trivial kernel through the configured smoke command. Any
/// runtime error is a CUDA failure.
async fn cuda_smoke(config: &ProbeConfig) -> Result<(), ProbeFailure> {
    let script = config
        .cuda_smoke_cmd
        .clone()
        .unwrap_or_else(|| DEFAULT_CUDA_SMOKE.to_string());
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(&script);
    let output = run_probe(cmd, config.probe_timeout, "cuda smoke test")
        .await
        .map_err(|e| ProbeFailure::new(EXIT_CUDA_FAILURE, e))?;

    if !output.status.success() {
        return Err(ProbeFailure::new(
            EXIT_CUDA_FAILURE,
            format!(
                "cuda smoke test failed: {}",
                String::from_utf8_lossy(&output.stderr)
                    .lines()
                    .last()
                    .unwrap_or("")
            ),
        ));
    }
    info!("cuda smoke test passed");
    Ok(())
}

/// Compare visible device count with the expected count. Best-effort in
/// that a missing expectation skips the probe; a real mismatch means a
/// mis-sliced MIG node or broken container and is a node fault.
pub(crate) fn mig_sanity(config: &ProbeConfig, visible: usize) -> Result<(), ProbeFailure> {
    let Some(expected) = config.expected_gpus.or_else(expected_from_env) else {
        return Ok(());
    };
    if expected != visible {
        return Err(ProbeFailure::new(
            EXIT_NODE_FAULT,
            format!("visible device count mismatch: expected {expected}, found {visible}"),
        ));
    }
    Ok(())
}

/// List GPU compute processes and flag PIDs owned by other users. The
/// allocation is unusable, but the processes are not ours to kill.
async fn trespasser_scan(config: &ProbeConfig) -> Result<(), ProbeFailure> {
    let mut cmd = Command::new("nvidia-smi");
    cmd.arg("--query-compute-apps=pid")
        .arg("--format=csv,noheader");
    let output = match run_probe(cmd, config.probe_timeout, "trespasser scan").await {
        Ok(output) if output.status.success() => output,
        // Best-effort: clusters without compute-app queries skip the probe.
        Ok(_) | Err(_) => {
            warn!("trespasser scan unavailable, skipping");
            return Ok(());
        }
    };

    let Some(my_uid) = process_uid("self") else {
        return Ok(());
    };
    for pid in parse_pids(&String::from_utf8_lossy(&output.stdout)) {
        match process_uid(&pid.to_string()) {
            Some(uid) if uid != my_uid => {
                return Err(ProbeFailure::new(
                    EXIT_TRESPASSER,
                    format!("foreign gpu process pid={pid} uid={uid}"),
                ));
            }
            // Already exited, or ours.
            _ => {}
        }
    }
    info!("trespasser scan clean");
    Ok(())
}

/// Run a probe command under its budget. A timeout or spawn error is
/// reported as a probe failure by the caller.
async fn run_probe(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{description} failed: {io_err}")),
        Err(_elapsed) => Err(format!(
            "{description} timed out after {}s",
            timeout.as_secs()
        )),
    }
}

/// Count devices in `nvidia-smi -L` output.
pub(crate) fn parse_gpu_list(stdout: &str) -> usize {
    stdout
        .lines()
        .filter(|line| line.trim_start().starts_with("GPU "))
        .count()
}

/// PIDs from `--query-compute-apps=pid --format=csv,noheader` output.
pub(crate) fn parse_pids(stdout: &str) -> Vec<u32> {
    stdout
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}

/// Device count implied by CUDA_VISIBLE_DEVICES, when set and non-empty.
fn expected_from_env() -> Option<usize> {
    let devices = std::env::var("CUDA_VISIBLE_DEVICES").ok()?;
    let trimmed = devices.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.split(',').count())
}

/// Owning UID of `/proc/<pid>`, if the process still exists.
fn process_uid(pid: &str) -> Option<u32> {
    std::fs::metadata(format!("/proc/{pid}")).ok().map(|m| m.uid())
}

#[cfg(test)]
#[path = "preflight_tests.rs"]
mod tests;
