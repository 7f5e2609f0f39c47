// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-run supervisor state machine.
//!
//! [`advance`] is a pure function: it mutates the run record according to
//! one tick's inputs and returns the side effects the engine must perform.
//! Transition rules are evaluated in a fixed priority order — stop, then
//! restart, then pause, then cancel confirmation, then the keep-alive
//! window, then retry exhaustion, then the scheduler-state rules, and
//! finally submission.
//!
//! Soft failures (stalls, lost jobs, workload exits) back off and resubmit
//! without touching the blacklist; only wrapper-reported node evidence
//! (exit 42/43/44) blacklists.

use crate::effect::Effect;
use crate::failover;
use shepherd_core::{
    backoff_delay, CancelFollowup, ControlSignals, EndedReason, FailureKind, FailureRecord,
    Heartbeat, MachineState, Progress, RunMeta, RunMode, SchedState,
};
use shepherd_sched::JobObservation;

/// Daemon-wide knobs the machine needs (per-run policy rides in the
/// record itself).
#[derive(Debug, Clone)]
pub struct Tunables {
    pub unknown_after_sec: u64,
    pub cancel_unknown_streak: u32,
    pub blacklist_ttl_trespass_sec: u64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            unknown_after_sec: 50,
            cancel_unknown_streak: 3,
            blacklist_ttl_trespass_sec: 1800,
        }
    }
}

/// One tick's view of a single run.
#[derive(Debug, Clone)]
pub struct TickInputs<'a> {
    pub now: u64,
    /// Scheduler observation for the run's current job id, if the batched
    /// snapshot had a row for it.
    pub observation: Option<&'a JobObservation>,
    pub heartbeat: Option<Heartbeat>,
    pub progress: Option<Progress>,
    pub failure: Option<FailureRecord>,
    pub final_marker: bool,
    pub control: ControlSignals,
    /// Backoff jitter sample in [-0.2, 0.2]; the engine draws it, tests
    /// pass 0.0.
    pub jitter_frac: f64,
}

impl TickInputs<'_> {
    fn sched_state(&self, meta: &RunMeta) -> Option<SchedState> {
        meta.job_id.map(|_| {
            self.observation
                .map(|obs| obs.state)
                .unwrap_or(SchedState::Unknown)
        })
    }

    /// The failure record, but only if it belongs to the current attempt.
    /// A record left over from an earlier job id must not re-blacklist.
    fn current_failure(&self, meta: &RunMeta) -> Option<&FailureRecord> {
        self.failure
            .as_ref()
            .filter(|rec| rec.job_id.is_none() || rec.job_id == meta.job_id)
    }
}

/// Advance one run by one tick. First matching rule wins.
pub fn advance(meta: &mut RunMeta, i: &TickInputs, tun: &Tunables) -> Vec<Effect> {
    if meta.is_terminal() {
        return Vec::new();
    }

    // 1. Stop always wins.
    if i.control.stop_requested {
        return handle_stop(meta, i, tun);
    }

    // 2. A fresh restart token: cancel, clear counters, resubmit.
    if let Some(token) = i.control.requested_restart_token.clone() {
        if meta.last_restart_token.as_deref() != Some(token.as_str()) {
            return consume_restart(meta, token, i);
        }
    }

    // 3. Pause: cancel live work, hold in backoff, no failure counted.
    if i.control.paused {
        return handle_pause(meta, i, tun);
    }

    // 4. An in-flight cancel is confirmed before anything else is decided.
    if meta.state == MachineState::Cancelling {
        return confirm_cancel(meta, i, tun);
    }

    // 5. Keep-alive expiry (positive windows cancel at the deadline; a
    //    zero window ends the run at its first exit instead, see
    //    classify_failure).
    if meta.run_mode == RunMode::Indefinite && meta.policy.keep_alive_sec > 0 {
        if let Some(started) = meta.run_started_at {
            if i.now.saturating_sub(started) >= meta.policy.keep_alive_sec {
                return expire_window(meta, i);
            }
        }
    }

    // 6. Retry exhaustion (normally caught eagerly in classify_failure;
    //    this also catches records recovered mid-backoff).
    if meta.run_mode == RunMode::RunOnce
        && meta.state == MachineState::Backoff
        && meta.submission_count > meta.policy.max_retries
    {
        return end(meta, EndedReason::MaxRetries);
    }

    // 7.-9. Scheduler-state driven rules for a linked job.
    if let Some(sched) = i.sched_state(meta) {
        match sched {
            SchedState::Completed => return handle_completed(meta, i, tun),
            SchedState::Failed
            | SchedState::Cancelled
            | SchedState::Timeout
            | SchedState::Preempted => return classify_failure(meta, i, tun),
            SchedState::Running => return handle_running(meta, i, tun),
            SchedState::Pending => {
                meta.state = MachineState::Queued;
                return Vec::new();
            }
            SchedState::Unknown => {
                let age = meta
                    .last_submit_at
                    .map(|t| i.now.saturating_sub(t))
                    .unwrap_or(0);
                if age > tun.unknown_after_sec {
                    return classify_failure(meta, i, tun);
                }
                return Vec::new();
            }
        }
    }

    // 10. Submission: INIT, a due backoff, or a submit that never landed.
    let due = match meta.state {
        MachineState::Init => true,
        MachineState::Backoff => meta.next_submit_at.map(|t| i.now >= t).unwrap_or(true),
        MachineState::SubmitPending => meta.job_id.is_none(),
        _ => false,
    };
    if due {
        let partition = failover::choose_partition(meta, i.now);
        meta.state = MachineState::SubmitPending;
        return vec![Effect::Submit { partition }];
    }

    Vec::new()
}

fn handle_stop(meta: &mut RunMeta, i: &TickInputs, tun: &Tunables) -> Vec<Effect> {
    if meta.has_live_job() {
        if meta.state == MachineState::Cancelling {
            meta.cancel_followup = Some(CancelFollowup::Stop);
            return confirm_cancel(meta, i, tun);
        }
        let job_id = match meta.job_id {
            Some(id) => id,
            None => return end_stopped(meta, i),
        };
        meta.state = MachineState::Cancelling;
        meta.cancel_followup = Some(CancelFollowup::Stop);
        meta.unknown_streak = 0;
        return vec![Effect::Cancel { job_id }];
    }
    end_stopped(meta, i)
}

/// Terminal marker for a stop request. A run-once run whose success
/// sentinel already exists ends as success — `final.json` implies
/// `ended.json{success}` no matter how the end was triggered.
fn end_stopped(meta: &mut RunMeta, i: &TickInputs) -> Vec<Effect> {
    if meta.run_mode == RunMode::RunOnce && i.final_marker {
        return end(meta, EndedReason::Success);
    }
    end(meta, EndedReason::StoppedManual)
}

fn consume_restart(meta: &mut RunMeta, token: String, i: &TickInputs) -> Vec<Effect> {
    tracing::info!(run_id = %meta.run_id, "consuming restart request");
    meta.last_restart_token = Some(token);
    meta.consecutive_failures = 0;
    meta.partition_failure_counts.clear();
    meta.next_submit_at = Some(i.now);
    if meta.has_live_job() {
        let job_id = match meta.job_id {
            Some(id) => id,
            None => {
                meta.state = MachineState::Backoff;
                return Vec::new();
            }
        };
        meta.state = MachineState::Cancelling;
        meta.cancel_followup = Some(CancelFollowup::Backoff);
        meta.unknown_streak = 0;
        return vec![Effect::Cancel { job_id }];
    }
    if meta.state != MachineState::Init {
        meta.state = MachineState::Backoff;
    }
    Vec::new()
}

fn handle_pause(meta: &mut RunMeta, i: &TickInputs, tun: &Tunables) -> Vec<Effect> {
    // Held: no submissions while paused.
    meta.next_submit_at = None;

    if meta.state == MachineState::Cancelling {
        return confirm_cancel(meta, i, tun);
    }
    if meta.has_live_job() {
        let job_id = match meta.job_id {
            Some(id) => id,
            None => return Vec::new(),
        };
        meta.state = MachineState::Cancelling;
        meta.cancel_followup = Some(CancelFollowup::Backoff);
        meta.unknown_streak = 0;
        return vec![Effect::Cancel { job_id }];
    }
    if meta.state != MachineState::Init {
        meta.state = MachineState::Backoff;
    }
    Vec::new()
}

fn expire_window(meta: &mut RunMeta, i: &TickInputs) -> Vec<Effect> {
    if meta.has_live_job() {
        let job_id = match meta.job_id {
            Some(id) => id,
            None => return end(meta, EndedReason::WindowExpired),
        };
        meta.state = MachineState::Cancelling;
        meta.cancel_followup = Some(CancelFollowup::WindowExpired);
        meta.unknown_streak = 0;
        tracing::info!(run_id = %meta.run_id, job_id, "keep-alive window expired, cancelling");
        return vec![Effect::Cancel { job_id }];
    }
    end(meta, EndedReason::WindowExpired)
}

/// While CANCELLING, wait until the scheduler confirms the job is gone —
/// or until enough consecutive UNKNOWN observations say it will never be
/// confirmed — then take the recorded follow-up.
fn confirm_cancel(meta: &mut RunMeta, i: &TickInputs, tun: &Tunables) -> Vec<Effect> {
    let sched = i.sched_state(meta).unwrap_or(SchedState::Unknown);

    if sched == SchedState::Unknown {
        meta.unknown_streak += 1;
        if meta.unknown_streak < tun.cancel_unknown_streak {
            return Vec::new();
        }
    } else if !sched.is_gone() {
        // Still draining; scancel is not instantaneous.
        meta.unknown_streak = 0;
        return Vec::new();
    }

    meta.job_id = None;
    meta.unknown_streak = 0;
    match meta.cancel_followup.take() {
        Some(CancelFollowup::Stop) => end_stopped(meta, i),
        Some(CancelFollowup::WindowExpired) => end(meta, EndedReason::WindowExpired),
        Some(CancelFollowup::Backoff) | None => {
            meta.state = MachineState::Backoff;
            Vec::new()
        }
    }
}

fn handle_completed(meta: &mut RunMeta, i: &TickInputs, tun: &Tunables) -> Vec<Effect> {
    let exit_code = i.observation.and_then(|obs| obs.exit_code).unwrap_or(0);
    if meta.run_mode == RunMode::RunOnce && i.final_marker && exit_code == 0 {
        meta.job_id = None;
        return end(meta, EndedReason::Success);
    }
    // COMPLETED without the sentinel (run_once) or any clean exit of an
    // indefinite service: a failure for restart purposes.
    classify_failure(meta, i, tun)
}

fn handle_running(meta: &mut RunMeta, i: &TickInputs, tun: &Tunables) -> Vec<Effect> {
    meta.unknown_streak = 0;
    let grace = meta.policy.heartbeat_grace_sec;
    let uptime = meta
        .last_submit_at
        .map(|t| i.now.saturating_sub(t))
        .unwrap_or(0);
    let heartbeat_fresh = i
        .heartbeat
        .map(|hb| !hb.is_stale(i.now, grace))
        .unwrap_or(false);

    if meta.state != MachineState::Running {
        meta.state = MachineState::Running;
    }
    if heartbeat_fresh && uptime >= meta.policy.healthy_uptime_sec {
        meta.consecutive_failures = 0;
    }

    // Wrapper startup grace: a missing or stale heartbeat right after
    // submission is expected, not a stall.
    if uptime < grace {
        return Vec::new();
    }

    let progress_stale = i
        .progress
        .as_ref()
        .map(|p| p.is_stale(i.now, meta.policy.progress_stall_sec))
        .unwrap_or(false);

    if !heartbeat_fresh || progress_stale {
        return stall_failure(meta, i, tun, !heartbeat_fresh);
    }

    Vec::new()
}

/// Heartbeat or progress stall: cancel and count a soft failure. No node
/// evidence, so never a blacklist entry.
fn stall_failure(
    meta: &mut RunMeta,
    i: &TickInputs,
    tun: &Tunables,
    heartbeat_stale: bool,
) -> Vec<Effect> {
    let job_id = match meta.job_id {
        Some(id) => id,
        None => return classify_failure(meta, i, tun),
    };
    meta.consecutive_failures += 1;
    meta.record_partition_failure();
    let delay = backoff_delay(&meta.policy, meta.consecutive_failures, i.jitter_frac);
    meta.next_submit_at = Some(i.now + delay);
    meta.state = MachineState::Cancelling;
    meta.unknown_streak = 0;
    meta.cancel_followup = Some(
        if meta.run_mode == RunMode::Indefinite && meta.policy.keep_alive_sec == 0 {
            CancelFollowup::WindowExpired
        } else {
            CancelFollowup::Backoff
        },
    );
    tracing::warn!(
        run_id = %meta.run_id,
        job_id,
        cause = if heartbeat_stale { "heartbeat" } else { "progress" },
        consecutive_failures = meta.consecutive_failures,
        "stall detected, cancelling allocation"
    );
    vec![Effect::Cancel { job_id }]
}

/// A finished-badly allocation: read the wrapper's failure evidence,
/// blacklist when it implicates the node, count the failure, and either
/// end the run (policy exhausted) or schedule the resubmission.
fn classify_failure(meta: &mut RunMeta, i: &TickInputs, tun: &Tunables) -> Vec<Effect> {
    let mut effects = Vec::new();
    let record = i.current_failure(meta);
    let kind = record.map(|rec| rec.kind).unwrap_or(FailureKind::Unknown);

    if kind.blacklists() && meta.policy.blacklist_limit > 0 {
        let node = record
            .map(|rec| rec.node.clone())
            .filter(|node| !node.is_empty())
            .or_else(|| i.observation.and_then(|obs| obs.node.clone()));
        if let Some(node) = node {
            let ttl_sec = if kind == FailureKind::Trespasser {
                tun.blacklist_ttl_trespass_sec
            } else {
                meta.policy.blacklist_ttl_sec
            };
            effects.push(Effect::BlacklistNode {
                node,
                ttl_sec,
                kind,
                reason: record
                    .map(|rec| rec.detail.clone())
                    .unwrap_or_else(|| kind.to_string()),
            });
        }
    }

    meta.consecutive_failures += 1;
    meta.record_partition_failure();
    meta.job_id = None;
    meta.unknown_streak = 0;

    tracing::info!(
        run_id = %meta.run_id,
        %kind,
        consecutive_failures = meta.consecutive_failures,
        "classified failure"
    );

    if meta.run_mode == RunMode::RunOnce && meta.submission_count > meta.policy.max_retries {
        effects.extend(end(meta, EndedReason::MaxRetries));
        return effects;
    }
    if meta.run_mode == RunMode::Indefinite && meta.policy.keep_alive_sec == 0 {
        effects.extend(end(meta, EndedReason::WindowExpired));
        return effects;
    }

    let delay = backoff_delay(&meta.policy, meta.consecutive_failures, i.jitter_frac);
    meta.next_submit_at = Some(i.now + delay);
    meta.state = MachineState::Backoff;
    effects
}

fn end(meta: &mut RunMeta, reason: EndedReason) -> Vec<Effect> {
    meta.state = MachineState::Terminal;
    meta.job_id = None;
    meta.next_submit_at = None;
    meta.cancel_followup = None;
    vec![Effect::WriteEnded { reason }]
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
