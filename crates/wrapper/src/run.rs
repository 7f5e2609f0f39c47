// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The wrapper sequence: probes, heartbeat, workload, terminal markers.

use crate::preflight::{self, ProbeConfig};
use crate::{heartbeat, workload, WrapperArgs};
use shepherd_core::{
    Clock, FailureKind, FailureRecord, RunId, RunMode, SystemClock, EXIT_WORKLOAD_FAILURE,
};
use shepherd_store::{RunStore, StateLayout};
use std::time::Duration;
use tracing::{error, info, warn};

/// Execute the whole wrapper lifecycle; the return value is the process
/// exit code (the supervisor keys restart and blacklist decisions off it).
pub fn run(args: WrapperArgs) -> i32 {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("shepherd-wrapper: cannot start runtime: {e}");
            return EXIT_WORKLOAD_FAILURE;
        }
    };
    runtime.block_on(run_inner(args))
}

async fn run_inner(args: WrapperArgs) -> i32 {
    let store = RunStore::new(StateLayout::new(&args.state_dir));
    let run_id = RunId::new(&args.run_id);

    info!(
        %run_id,
        run_mode = %args.run_mode,
        node = %node_name(),
        job_id = ?slurm_job_id(),
        "wrapper starting"
    );

    // 1. Preflight: a broken node aborts before the workload starts.
    let probe_config = ProbeConfig {
        probe_timeout: Duration::from_secs(args.probe_timeout),
        expected_gpus: args.expected_gpus,
        cuda_smoke_cmd: args.cuda_smoke_cmd.clone(),
    };
    if let Err(failure) = preflight::run_preflight(&probe_config).await {
        error!(
            code = failure.exit_code,
            kind = %failure.kind,
            detail = %failure.detail,
            "preflight probe failed"
        );
        write_failure(&store, &run_id, failure.exit_code, failure.kind, &failure.detail);
        return failure.exit_code;
    }

    // 2. Heartbeat while the workload runs.
    let heartbeat = heartbeat::spawn(store.clone(), run_id.clone(), args.heartbeat_interval);

    // 3. The workload itself.
    let code = match workload::run_workload(&args.workload).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "cannot start workload");
            EXIT_WORKLOAD_FAILURE
        }
    };

    heartbeat.stop().await;

    // 4. Terminal markers.
    if code == 0 {
        if args.run_mode == RunMode::RunOnce {
            if let Err(e) = store.write_final(&run_id) {
                // Without the sentinel the supervisor counts this attempt
                // as a failure and retries, which is the safe direction.
                error!(error = %e, "cannot write success sentinel");
            }
        }
    } else {
        write_failure(
            &store,
            &run_id,
            code,
            FailureKind::from_exit_code(code),
            "workload exited nonzero",
        );
    }

    code
}

fn write_failure(store: &RunStore, run_id: &RunId, exit_code: i32, kind: FailureKind, detail: &str) {
    let record = FailureRecord {
        exit_code,
        kind,
        node: node_name(),
        job_id: slurm_job_id(),
        timestamp: SystemClock.epoch_secs(),
        detail: detail.to_string(),
    };
    if let Err(e) = store.write_failure(run_id, &record) {
        warn!(%run_id, error = %e, "cannot write failure record");
    }
}

/// The node we are on: Slurm's own claim first, then the kernel hostname.
fn node_name() -> String {
    if let Ok(node) = std::env::var("SLURMD_NODENAME") {
        if !node.is_empty() {
            return node;
        }
    }
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

fn slurm_job_id() -> Option<u64> {
    std::env::var("SLURM_JOB_ID").ok()?.parse().ok()
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
