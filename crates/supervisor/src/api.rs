// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control surface for external CLI/TUI processes.
//!
//! Everything here works through atomic file writes against the shared
//! state root — there is no RPC channel to the daemon. The supervisor
//! observes control changes on its next tick.

use shepherd_core::{
    derive_status, ControlSignals, FailureRecord, MachineState, RunId, RunMeta, RunStatus,
    StatusInputs,
};
use shepherd_sched::SchedSnapshot;
use shepherd_store::{BlacklistStore, RunStore, StoreError};

/// A control operation on one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOp {
    Pause,
    Unpause,
    Stop,
    Restart,
}

/// One run's normalized status plus the fields a list view renders.
#[derive(Debug, Clone)]
pub struct RunStatusView {
    pub run_id: RunId,
    pub status: RunStatus,
    pub state: MachineState,
    pub job_id: Option<u64>,
    pub partition: Option<String>,
    pub submission_count: u32,
    pub consecutive_failures: u32,
    /// The most recent crash, if the wrapper reported one.
    pub last_failure: Option<FailureRecord>,
}

/// Register a new run. The daemon picks it up on its next tick.
pub fn create_run(store: &RunStore, meta: &RunMeta) -> Result<(), StoreError> {
    store.create_run(meta)
}

/// Every run id known to the state root.
pub fn list_runs(store: &RunStore) -> Result<Vec<RunId>, StoreError> {
    store.list_runs()
}

/// Deliver a control operation by rewriting `control.json`.
///
/// `Restart` mints a fresh token; the supervisor consumes each token at
/// most once, so repeated restarts need repeated calls.
pub fn submit_control(
    store: &RunStore,
    run_id: &RunId,
    op: ControlOp,
) -> Result<ControlSignals, StoreError> {
    let mut control = store.load_control(run_id)?;
    match op {
        ControlOp::Pause => control.paused = true,
        ControlOp::Unpause => control.paused = false,
        ControlOp::Stop => control.stop_requested = true,
        ControlOp::Restart => {
            control.requested_restart_token = Some(uuid::Uuid::new_v4().to_string());
        }
    }
    store.save_control(run_id, &control)?;
    Ok(control)
}

/// Pure status read for one run: on-disk state plus the caller's batched
/// scheduler snapshot.
pub fn get_status(
    store: &RunStore,
    run_id: &RunId,
    snapshot: &SchedSnapshot,
    now: u64,
) -> Result<Option<RunStatusView>, StoreError> {
    let Some(meta) = store.load_meta(run_id)? else {
        return Ok(None);
    };
    let ended = store.load_ended(run_id)?;
    let control = store.load_control(run_id)?;
    let heartbeat = store.load_heartbeat(run_id)?;
    let progress = store.load_progress(run_id)?;
    let last_failure = store.load_failure(run_id)?;

    let status = derive_status(&StatusInputs {
        now,
        ended: ended.as_ref(),
        machine: meta.state,
        consecutive_failures: meta.consecutive_failures,
        sched: meta.job_id.map(|id| snapshot.state(id)),
        heartbeat,
        progress: progress.as_ref(),
        last_submit_at: meta.last_submit_at,
        paused: control.paused,
        heartbeat_grace_sec: meta.policy.heartbeat_grace_sec,
        progress_stall_sec: meta.policy.progress_stall_sec,
    });

    Ok(Some(RunStatusView {
        run_id: run_id.clone(),
        status,
        state: meta.state,
        job_id: meta.job_id,
        partition: meta.partition.clone(),
        submission_count: meta.submission_count,
        consecutive_failures: meta.consecutive_failures,
        last_failure,
    }))
}

/// Manually add a node to the blacklist.
pub fn blacklist_add(
    blacklist: &BlacklistStore,
    now: u64,
    node: &str,
    ttl_sec: u64,
    reason: &str,
) -> Result<(), StoreError> {
    blacklist.update(now, |bl| bl.insert(node, reason, ttl_sec, now))?;
    Ok(())
}

/// Manually clear a node from the blacklist.
pub fn blacklist_remove(blacklist: &BlacklistStore, node: &str) -> Result<bool, StoreError> {
    let mut removed = false;
    // Prune with now = 0 so no entry expires as a side effect of removal.
    blacklist.update(0, |bl| removed = bl.remove(node))?;
    Ok(removed)
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
