// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Partition failover.
//!
//! Rotation over the ordered, preferred-first partition list: a partition
//! that has absorbed `retry_per_partition` failures hands off to the next
//! (wrapping), and after `reset_to_preferred_sec` away the counters clear
//! and the preferred partition gets another chance. Without a fallback
//! block every submission targets the preferred partition.

use shepherd_core::RunMeta;

/// Pick the partition for the next submission, updating the record's
/// rotation bookkeeping (`partition`, `preferred_last_tried_at`, and, on a
/// preferred reset, the failure counters).
pub fn choose_partition(meta: &mut RunMeta, now: u64) -> Option<String> {
    let partitions: Vec<String> = meta.effective_partitions().to_vec();
    let Some(preferred) = partitions.first().cloned() else {
        meta.partition = None;
        return None;
    };

    let Some(fallback) = meta.partition_fallback.clone() else {
        // No rotation policy: always the preferred partition.
        meta.preferred_last_tried_at = Some(now);
        meta.partition = Some(preferred.clone());
        return Some(preferred);
    };

    // Periodic reset: after long enough away, forgive the preferred
    // partition and start the rotation over.
    let reset_due = meta
        .preferred_last_tried_at
        .map(|t| now.saturating_sub(t) >= fallback.reset_to_preferred_sec)
        .unwrap_or(false);
    if reset_due {
        tracing::info!(
            run_id = %meta.run_id,
            partition = %preferred,
            "resetting partition rotation to preferred"
        );
        meta.partition_failure_counts.clear();
        meta.preferred_last_tried_at = Some(now);
        meta.partition = Some(preferred.clone());
        return Some(preferred);
    }

    let current = meta
        .partition
        .clone()
        .unwrap_or_else(|| preferred.clone());
    let mut idx = partitions
        .iter()
        .position(|p| *p == current)
        .unwrap_or(0);

    let failures = meta
        .partition_failure_counts
        .get(&partitions[idx])
        .copied()
        .unwrap_or(0);
    if failures >= fallback.retry_per_partition {
        idx = (idx + 1) % partitions.len();
        tracing::info!(
            run_id = %meta.run_id,
            from = %current,
            to = %partitions[idx],
            failures,
            "partition failover"
        );
    }

    if idx == 0 {
        meta.preferred_last_tried_at = Some(now);
    }
    meta.partition = Some(partitions[idx].clone());
    Some(partitions[idx].clone())
}

#[cfg(test)]
#[path = "failover_tests.rs"]
mod tests;
