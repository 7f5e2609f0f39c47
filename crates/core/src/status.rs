// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status normalization: one closed-set status per run.
//!
//! A pure function of the on-disk state plus the batched scheduler
//! snapshot. CLI and TUI render this value and nothing else, so the
//! selection rules live here in one place.

use crate::ended::{EndedMarker, EndedReason};
use crate::heartbeat::Heartbeat;
use crate::progress::Progress;
use crate::run::MachineState;
use crate::sched_state::SchedState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized run status, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    StoppedManual,
    CompletedSuccess,
    EndedExpired,
    CrashLoop,
    Unresponsive,
    Restarting,
    RunningDegraded,
    HealthyRunning,
    Pending,
    ErrorUnknown,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::StoppedManual => "stopped_manual",
            RunStatus::CompletedSuccess => "completed_success",
            RunStatus::EndedExpired => "ended_expired",
            RunStatus::CrashLoop => "crash_loop",
            RunStatus::Unresponsive => "unresponsive",
            RunStatus::Restarting => "restarting",
            RunStatus::RunningDegraded => "running_degraded",
            RunStatus::HealthyRunning => "healthy_running",
            RunStatus::Pending => "pending",
            RunStatus::ErrorUnknown => "error_unknown",
        };
        write!(f, "{s}")
    }
}

/// Everything status derivation looks at.
#[derive(Debug, Clone)]
pub struct StatusInputs<'a> {
    pub now: u64,
    pub ended: Option<&'a EndedMarker>,
    pub machine: MachineState,
    pub consecutive_failures: u32,
    /// Scheduler state for the current job id, if any job is linked.
    pub sched: Option<SchedState>,
    pub heartbeat: Option<Heartbeat>,
    pub progress: Option<&'a Progress>,
    pub last_submit_at: Option<u64>,
    pub paused: bool,
    pub heartbeat_grace_sec: u64,
    pub progress_stall_sec: u64,
}

/// Derive the normalized status. First matching rule wins, in the
/// priority order of the [`RunStatus`] variants.
pub fn derive_status(i: &StatusInputs) -> RunStatus {
    if let Some(ended) = i.ended {
        return match ended.reason {
            EndedReason::StoppedManual => RunStatus::StoppedManual,
            EndedReason::Success => RunStatus::CompletedSuccess,
            EndedReason::WindowExpired => RunStatus::EndedExpired,
            EndedReason::MaxRetries => RunStatus::CrashLoop,
            EndedReason::FatalError => RunStatus::ErrorUnknown,
        };
    }

    if i.machine == MachineState::Backoff && i.consecutive_failures >= 3 {
        return RunStatus::CrashLoop;
    }

    let in_startup_grace = i
        .last_submit_at
        .map(|t| i.now.saturating_sub(t) < i.heartbeat_grace_sec)
        .unwrap_or(false);
    let heartbeat_stale = i
        .heartbeat
        .map(|hb| hb.is_stale(i.now, i.heartbeat_grace_sec))
        .unwrap_or(true);
    let running = i.sched == Some(SchedState::Running);

    if running && heartbeat_stale && !in_startup_grace {
        return RunStatus::Unresponsive;
    }

    if i.machine == MachineState::Backoff && !i.paused {
        return RunStatus::Restarting;
    }

    let progress_stale = i
        .progress
        .map(|p| p.is_stale(i.now, i.progress_stall_sec))
        .unwrap_or(false);

    if i.paused || (running && progress_stale) {
        return RunStatus::RunningDegraded;
    }

    if running {
        return RunStatus::HealthyRunning;
    }

    if i.sched == Some(SchedState::Pending)
        || matches!(
            i.machine,
            MachineState::Init | MachineState::SubmitPending | MachineState::Queued
        )
    {
        return RunStatus::Pending;
    }

    RunStatus::ErrorUnknown
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
