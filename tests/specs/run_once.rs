// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Happy path: one submission, one clean exit, one success marker.

use crate::prelude::*;

#[tokio::test]
async fn happy_path_run_once() {
    let w = world();
    let run = w.create_run_once("train-7b", 3);

    // Tick 1: submitted and queued.
    w.tick().await;
    assert_eq!(w.meta(&run).submission_count, 1);
    assert_eq!(w.status(&run).await, RunStatus::Pending);

    // The allocation starts and the wrapper heartbeats.
    w.set_running(&run, "gpu-node-01");
    w.clock.advance(60);
    w.heartbeat(&run, w.clock.epoch_secs());
    w.tick().await;
    assert_eq!(w.meta(&run).state, MachineState::Running);
    assert_eq!(w.status(&run).await, RunStatus::HealthyRunning);

    // The workload exits 0 and the wrapper writes the sentinel.
    w.wrapper_succeeds(&run, "gpu-node-01");
    w.clock.advance(300);
    w.tick().await;

    assert_eq!(w.ended_reason(&run), Some(EndedReason::Success));
    assert_eq!(w.status(&run).await, RunStatus::CompletedSuccess);
    let meta = w.meta(&run);
    assert_eq!(meta.submission_count, 1);
    assert!(meta.is_terminal());
    assert!(w.blacklist().load().unwrap().is_empty());
}

#[tokio::test]
async fn exit_zero_without_sentinel_is_not_success() {
    let w = world();
    let run = w.create_run_once("train-7b", 3);
    w.tick().await;

    // COMPLETED with exit 0 but no final.json: the wrapper died before
    // the sentinel landed, or the workload lied. Retry.
    let job_id = w.job_id(&run);
    w.sched.set_observation(
        job_id,
        JobObservation {
            state: SchedState::Completed,
            node: Some("gpu-node-01".into()),
            partition: None,
            exit_code: Some(0),
        },
    );
    w.clock.advance(60);
    w.tick().await;

    assert_eq!(w.ended_reason(&run), None);
    let meta = w.meta(&run);
    assert_eq!(meta.state, MachineState::Backoff);
    assert_eq!(meta.consecutive_failures, 1);
}
