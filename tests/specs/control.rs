// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control surface: pause, stop, and restart delivered through
//! control.json, honored within a tick.

use crate::prelude::*;

#[tokio::test]
async fn pause_holds_and_unpause_resumes() {
    let w = world();
    let run = w.create_run_once("train-7b", 3);

    w.tick().await;
    let job_id = w.job_id(&run);
    w.set_running(&run, "gpu-node-01");

    api::submit_control(w.store(), &run, ControlOp::Pause).unwrap();
    w.clock.advance(10);
    w.tick().await;
    assert_eq!(w.sched.cancels(), [job_id]);
    // Pausing is not a failure.
    assert_eq!(w.meta(&run).consecutive_failures, 0);

    // Confirmed gone: held indefinitely while paused.
    w.clock.advance(5);
    w.tick().await;
    let meta = w.meta(&run);
    assert_eq!(meta.state, MachineState::Backoff);
    assert_eq!(meta.next_submit_at, None);
    assert_eq!(w.status(&run).await, RunStatus::RunningDegraded);

    w.clock.advance(500);
    w.tick().await;
    assert_eq!(w.meta(&run).submission_count, 1); // still held

    api::submit_control(w.store(), &run, ControlOp::Unpause).unwrap();
    w.clock.advance(10);
    w.tick().await;
    assert_eq!(w.meta(&run).submission_count, 2);
}

#[tokio::test]
async fn stop_cancels_and_goes_terminal() {
    let w = world();
    let run = w.create_run_once("train-7b", 3);

    w.tick().await;
    let job_id = w.job_id(&run);
    w.set_running(&run, "gpu-node-01");

    api::submit_control(w.store(), &run, ControlOp::Stop).unwrap();
    w.clock.advance(10);
    w.tick().await;
    assert_eq!(w.sched.cancels(), [job_id]);

    w.clock.advance(5);
    w.tick().await;
    assert_eq!(w.ended_reason(&run), Some(EndedReason::StoppedManual));
    assert_eq!(w.status(&run).await, RunStatus::StoppedManual);

    // Terminal means terminal: nothing moves afterwards.
    let before = w.meta(&run);
    w.clock.advance(1_000);
    w.tick().await;
    assert_eq!(w.meta(&run), before);
    assert_eq!(w.sched.submissions().len(), 1);
}

#[tokio::test]
async fn restart_cancels_clears_counters_and_resubmits() {
    let w = world();
    let run = w.create_run_once("train-7b", 5);

    // Accumulate some failure history first.
    w.tick().await;
    w.clock.advance(20);
    w.wrapper_fails(&run, 50, "gpu-node-01");
    w.tick().await;
    w.advance_past_backoff(&run);
    w.tick().await;
    assert_eq!(w.meta(&run).consecutive_failures, 1);

    let job_id = w.job_id(&run);
    w.set_running(&run, "gpu-node-01");

    api::submit_control(w.store(), &run, ControlOp::Restart).unwrap();
    w.clock.advance(10);
    w.tick().await;
    assert_eq!(w.sched.cancels(), [job_id]);
    assert_eq!(w.meta(&run).consecutive_failures, 0);

    // Confirmed, then immediately resubmitted.
    w.clock.advance(5);
    w.tick().await;
    w.clock.advance(5);
    w.tick().await;
    assert_eq!(w.meta(&run).submission_count, 3);

    // The consumed token does not trigger again.
    w.set_running(&run, "gpu-node-01");
    w.clock.advance(10);
    w.heartbeat(&run, w.clock.epoch_secs());
    w.tick().await;
    assert_eq!(w.sched.cancels(), [job_id]); // no new cancels
}
