// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Partition failover: rotate away from a failing partition, return to
//! the preferred one after the reset interval.

use crate::prelude::*;
use shepherd_core::PartitionFallback;

fn create_failover_run(w: &World) -> RunId {
    let run_id = RunId::new("train-7b");
    let mut meta = RunMeta::new(run_id.clone(), RunMode::RunOnce, "/jobs/train.sbatch");
    meta.policy.max_retries = 10;
    meta.partition_fallback = Some(PartitionFallback {
        partitions: vec!["A".into(), "B".into()],
        retry_per_partition: 2,
        reset_to_preferred_sec: 3_600,
    });
    w.store().create_run(&meta).unwrap();
    run_id
}

#[tokio::test]
async fn two_failures_switch_partitions_and_an_hour_resets() {
    let w = world();
    let run = create_failover_run(&w);

    // Two failing attempts on A.
    for _ in 0..2 {
        w.tick().await;
        assert_eq!(w.meta(&run).partition.as_deref(), Some("A"));
        w.clock.advance(20);
        w.wrapper_fails(&run, 50, "a-node");
        w.tick().await;
        w.advance_past_backoff(&run);
    }

    // Third submission switches to B.
    w.tick().await;
    assert_eq!(w.meta(&run).partition.as_deref(), Some("B"));
    let submissions = w.sched.submissions();
    assert_eq!(submissions[0].partition.as_deref(), Some("A"));
    assert_eq!(submissions[1].partition.as_deref(), Some("A"));
    assert_eq!(submissions[2].partition.as_deref(), Some("B"));

    // B fails too; an hour after A was last tried, counters reset and the
    // next submission targets A again.
    w.clock.advance(20);
    w.wrapper_fails(&run, 50, "b-node");
    w.tick().await;
    w.clock.advance(3_700);
    w.tick().await;

    let meta = w.meta(&run);
    assert_eq!(meta.partition.as_deref(), Some("A"));
    assert!(meta.partition_failure_counts.is_empty());
    assert_eq!(w.sched.submissions().last().unwrap().partition.as_deref(), Some("A"));
}
