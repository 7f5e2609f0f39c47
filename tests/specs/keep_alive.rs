// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Indefinite runs: restart on every exit until the keep-alive window
//! closes.

use crate::prelude::*;

#[tokio::test]
async fn indefinite_restarts_then_expires() {
    let w = world();
    let run = w.create_indefinite("serve-7b", 3_600);
    let started = w.clock.epoch_secs();

    // First allocation runs, then exits cleanly; the supervisor restarts it.
    w.tick().await;
    let first_job = w.job_id(&run);
    w.sched.set_observation(
        first_job,
        JobObservation {
            state: SchedState::Completed,
            node: Some("gpu-node-01".into()),
            partition: None,
            exit_code: Some(0),
        },
    );
    w.clock.advance(600);
    w.tick().await;
    assert_eq!(w.meta(&run).state, MachineState::Backoff);
    assert!(w.ended_reason(&run).is_none());

    w.advance_past_backoff(&run);
    w.tick().await;
    let second_job = w.job_id(&run);
    assert_ne!(second_job, first_job);
    assert_eq!(w.meta(&run).submission_count, 2);

    // The window closes mid-flight: cancel, then window_expired.
    w.set_running(&run, "gpu-node-01");
    w.heartbeat(&run, started + 3_600);
    w.clock.set(started + 3_600);
    w.tick().await;
    assert_eq!(w.sched.cancels(), [second_job]);

    w.clock.advance(5);
    w.tick().await;
    assert_eq!(w.ended_reason(&run), Some(EndedReason::WindowExpired));
    assert_eq!(w.status(&run).await, RunStatus::EndedExpired);

    // run_started_at anchors the window at the first submission.
    assert_eq!(w.meta(&run).run_started_at, Some(started));
}

#[tokio::test]
async fn zero_window_ends_at_first_exit() {
    let w = world();
    let run = w.create_indefinite("one-shot-serve", 0);

    w.tick().await;
    let job_id = w.job_id(&run);

    // A healthy tick first: a zero window must not cancel live work.
    w.set_running(&run, "gpu-node-01");
    w.clock.advance(60);
    w.heartbeat(&run, w.clock.epoch_secs());
    w.tick().await;
    assert!(w.ended_reason(&run).is_none());
    assert!(w.sched.cancels().is_empty());

    // First clean exit ends the run.
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
    assert_eq!(w.ended_reason(&run), Some(EndedReason::WindowExpired));
}
