// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! shepherd-wrapper - the compute-side wrapper
//!
//! Launched by the batch script inside each allocation. Probes the node,
//! spawns the workload, heartbeats while it runs, and reports the outcome
//! through exit codes and marker files in the run's state directory.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod heartbeat;
mod preflight;
mod run;
mod workload;

use clap::Parser;
use shepherd_core::RunMode;
use std::path::PathBuf;

/// Runs a GPU workload under supervision inside a Slurm allocation.
#[derive(Debug, Parser)]
#[command(name = "shepherd-wrapper", version)]
pub struct WrapperArgs {
    /// Run identifier; names the run's directory under the state root.
    #[arg(long)]
    pub run_id: String,

    /// `run_once` or `indefinite`.
    #[arg(long, value_parser = parse_run_mode)]
    pub run_mode: RunMode,

    /// State root shared with the supervisor.
    #[arg(long)]
    pub state_dir: PathBuf,

    /// Seconds between heartbeat writes.
    #[arg(long, default_value_t = 30)]
    pub heartbeat_interval: u64,

    /// Wall-clock budget for each preflight probe.
    #[arg(long, default_value_t = 60)]
    pub probe_timeout: u64,

    /// Expected visible GPU count for the MIG/container sanity probe.
    /// Defaults to the device count in CUDA_VISIBLE_DEVICES, if set.
    #[arg(long)]
    pub expected_gpus: Option<usize>,

    /// Override the CUDA smoke-test command (run via `sh -c`).
    #[arg(long)]
    pub cuda_smoke_cmd: Option<String>,

    /// The workload command and its arguments.
    #[arg(last = true, required = true)]
    pub workload: Vec<String>,
}

fn parse_run_mode(s: &str) -> Result<RunMode, String> {
    s.parse()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = WrapperArgs::parse();
    let code = run::run(args);
    std::process::exit(code);
}
