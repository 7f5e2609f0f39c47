// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bad GPU then recovery: the faulty node is excluded, the retry lands
//! elsewhere and succeeds, and the blacklist entry outlives the run.

use crate::prelude::*;

#[tokio::test]
async fn bad_gpu_then_recovery() {
    let w = world();
    let run = w.create_run_once("train-7b", 3);

    // First attempt lands on nodeA; preflight exits 42.
    w.tick().await;
    w.clock.advance(30);
    w.wrapper_fails(&run, 42, "nodeA");
    let failed_at = w.clock.epoch_secs();
    w.tick().await;

    // nodeA is blacklisted with the hardware TTL.
    let blacklist = w.blacklist().load().unwrap();
    let entry = blacklist.get("nodeA").unwrap();
    assert_eq!(entry.ttl_sec, w.meta(&run).policy.blacklist_ttl_sec);
    assert!(entry.added_at >= failed_at);

    // Backoff is about one base interval.
    let meta = w.meta(&run);
    assert_within_jitter(
        meta.next_submit_at.unwrap() - failed_at,
        meta.policy.backoff_base_sec,
    );

    // The resubmission excludes nodeA.
    w.advance_past_backoff(&run);
    w.tick().await;
    let submissions = w.sched.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0].exclude, Vec::<String>::new());
    assert_eq!(submissions[1].exclude, ["nodeA"]);

    // Second attempt on nodeB succeeds.
    w.set_running(&run, "nodeB");
    w.clock.advance(60);
    w.heartbeat(&run, w.clock.epoch_secs());
    w.tick().await;
    w.wrapper_succeeds(&run, "nodeB");
    w.clock.advance(120);
    w.tick().await;

    assert_eq!(w.ended_reason(&run), Some(EndedReason::Success));
    // The strike persists for forensics until its TTL expires.
    let blacklist = w.blacklist().load().unwrap();
    assert!(blacklist.contains_active("nodeA", w.clock.epoch_secs()));
}

#[tokio::test]
async fn trespasser_strike_uses_the_short_ttl() {
    let w = world();
    let run = w.create_run_once("train-7b", 3);
    w.tick().await;

    w.clock.advance(30);
    w.wrapper_fails(&run, 43, "nodeC");
    w.tick().await;

    let blacklist = w.blacklist().load().unwrap();
    let entry = blacklist.get("nodeC").unwrap();
    assert_eq!(entry.ttl_sec, 1800);

    // The forensic log names the strike.
    let log =
        std::fs::read_to_string(w.store().layout().badnode_log_path(&run)).unwrap();
    assert!(log.contains("blacklist nodeC kind=trespasser"));
}
