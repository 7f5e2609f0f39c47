// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat stall: cancel, count a soft failure, resubmit. No blacklist —
//! a hang carries no node evidence.

use crate::prelude::*;

#[tokio::test]
async fn heartbeat_stall_cancels_and_resubmits() {
    let w = world();
    let run = w.create_run_once("train-7b", 3);

    w.tick().await;
    let job_id = w.job_id(&run);
    w.set_running(&run, "gpu-node-01");

    // Last heartbeat is 10x the grace period old; startup grace elapsed.
    let grace = w.meta(&run).policy.heartbeat_grace_sec;
    w.heartbeat(&run, w.clock.epoch_secs());
    w.clock.advance(10 * grace);

    // Before the supervisor reacts, the user sees "unresponsive".
    assert_eq!(w.status(&run).await, RunStatus::Unresponsive);

    w.tick().await;
    assert_eq!(w.sched.cancels(), [job_id]);
    let meta = w.meta(&run);
    assert_eq!(meta.consecutive_failures, 1);
    assert!(w.blacklist().load().unwrap().is_empty());

    // Cancel confirmed: the run waits out its backoff as "restarting".
    w.clock.advance(5);
    w.tick().await;
    assert_eq!(w.meta(&run).state, MachineState::Backoff);
    assert_eq!(w.status(&run).await, RunStatus::Restarting);

    // And resubmits.
    w.advance_past_backoff(&run);
    w.tick().await;
    assert_eq!(w.meta(&run).submission_count, 2);
    assert!(w.ended_reason(&run).is_none());
}

#[tokio::test]
async fn progress_stall_is_detected_with_a_live_heartbeat() {
    let w = world();
    let run_id = RunId::new("train-7b");
    let mut meta = RunMeta::new(run_id.clone(), RunMode::RunOnce, "/jobs/train.sbatch");
    meta.policy.progress_stall_sec = 600;
    w.store().create_run(&meta).unwrap();

    w.tick().await;
    w.set_running(&run_id, "gpu-node-01");

    // The wrapper heartbeats but the workload stopped making progress.
    use shepherd_store::write_json_atomic;
    write_json_atomic(
        &w.store().layout().progress_path(&run_id),
        &serde_json::json!({"epoch": w.clock.epoch_secs(), "step": 420}),
    )
    .unwrap();
    w.clock.advance(2_000);
    w.heartbeat(&run_id, w.clock.epoch_secs());
    w.tick().await;

    let meta = w.meta(&run_id);
    assert_eq!(meta.state, MachineState::Cancelling);
    assert_eq!(meta.consecutive_failures, 1);
    assert!(w.blacklist().load().unwrap().is_empty());
}
