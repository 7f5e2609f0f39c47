// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash loop: a workload that fails every attempt exhausts its retries
//! with exponential backoff and never touches the blacklist.

use crate::prelude::*;

#[tokio::test]
async fn four_workload_failures_end_in_max_retries() {
    let w = world();
    let run = w.create_run_once("train-7b", 3);

    let mut delays = Vec::new();
    for attempt in 1..=4u32 {
        w.tick().await; // submit
        assert_eq!(w.meta(&run).submission_count, attempt);

        w.clock.advance(20);
        w.wrapper_fails(&run, 50, "gpu-node-01");
        let failed_at = w.clock.epoch_secs();
        w.tick().await; // classify

        if attempt < 4 {
            let meta = w.meta(&run);
            delays.push(meta.next_submit_at.unwrap() - failed_at);
            // Status between attempts: restarting until the loop is
            // declared, crash_loop from the third consecutive failure.
            let expected = if meta.consecutive_failures >= 3 {
                RunStatus::CrashLoop
            } else {
                RunStatus::Restarting
            };
            assert_eq!(w.status(&run).await, expected);
            w.advance_past_backoff(&run);
        }
    }

    // Backoffs approximately base, 2x, 4x (jitter +/- 20%).
    let base = w.meta(&run).policy.backoff_base_sec;
    assert_within_jitter(delays[0], base);
    assert_within_jitter(delays[1], 2 * base);
    assert_within_jitter(delays[2], 4 * base);

    assert_eq!(w.ended_reason(&run), Some(EndedReason::MaxRetries));
    assert_eq!(w.status(&run).await, RunStatus::CrashLoop);
    assert!(w.blacklist().load().unwrap().is_empty());
    assert_eq!(w.meta(&run).submission_count, 4);
}

#[tokio::test]
async fn max_retries_zero_is_immediately_terminal() {
    let w = world();
    let run = w.create_run_once("fragile", 0);

    w.tick().await;
    w.clock.advance(20);
    w.wrapper_fails(&run, 50, "gpu-node-01");
    w.tick().await;

    assert_eq!(w.ended_reason(&run), Some(EndedReason::MaxRetries));
    assert_eq!(w.meta(&run).submission_count, 1);
}
