// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The run record persisted as `meta.json`.
//!
//! One record carries everything the supervisor knows about a run: the
//! submission template, the retry/stall policy, and the runtime linkage
//! (current job id, counters, machine state). The record is rewritten
//! atomically under the run lock on every tick that changes it, so a
//! supervisor restart recovers every run from this file alone.

use crate::id::RunId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// How long the supervisor keeps a run alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Retry until success or `max_retries` failures.
    RunOnce,
    /// Keep restarting until `keep_alive_sec` elapses.
    Indefinite,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::RunOnce => write!(f, "run_once"),
            RunMode::Indefinite => write!(f, "indefinite"),
        }
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "run_once" => Ok(RunMode::RunOnce),
            "indefinite" => Ok(RunMode::Indefinite),
            other => Err(format!("unknown run mode: {other}")),
        }
    }
}

/// Supervisor state machine position, persisted across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineState {
    #[default]
    Init,
    SubmitPending,
    Queued,
    Running,
    Cancelling,
    Backoff,
    Terminal,
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MachineState::Init => "init",
            MachineState::SubmitPending => "submit_pending",
            MachineState::Queued => "queued",
            MachineState::Running => "running",
            MachineState::Cancelling => "cancelling",
            MachineState::Backoff => "backoff",
            MachineState::Terminal => "terminal",
        };
        write!(f, "{s}")
    }
}

/// What happens once a cancelled allocation is confirmed gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelFollowup {
    /// Write `ended.json{stopped_manual}` and go terminal.
    Stop,
    /// Write `ended.json{window_expired}` and go terminal.
    WindowExpired,
    /// Enter backoff; `next_submit_at` decides when (or whether) to resubmit.
    Backoff,
}

/// Retry, stall, and blacklist thresholds for one run.
///
/// Every field has a serde default so `meta.json` only needs to spell out
/// what deviates from policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunPolicy {
    /// Resubmissions allowed after the initial one (`run_once`).
    pub max_retries: u32,
    /// Wall-clock window measured from the first submission (`indefinite`).
    pub keep_alive_sec: u64,
    /// Cadence at which the wrapper refreshes the heartbeat file.
    pub heartbeat_interval_sec: u64,
    /// Heartbeat age beyond which the run counts as hung (strict `>`).
    /// Doubles as the wrapper-startup grace window after a submission.
    pub heartbeat_grace_sec: u64,
    /// Progress age beyond which the run counts as stalled; 0 disables.
    pub progress_stall_sec: u64,
    pub backoff_base_sec: u64,
    pub backoff_max_sec: u64,
    /// Default blacklist TTL for hardware-class faults.
    pub blacklist_ttl_sec: u64,
    /// Cap on `--exclude` length; 0 disables blacklisting for this run.
    pub blacklist_limit: usize,
    /// Uptime with a fresh heartbeat required before `consecutive_failures`
    /// resets; 0 means the first fresh heartbeat counts.
    pub healthy_uptime_sec: u64,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            keep_alive_sec: 0,
            heartbeat_interval_sec: 30,
            heartbeat_grace_sec: 120,
            progress_stall_sec: 0,
            backoff_base_sec: 30,
            backoff_max_sec: 900,
            blacklist_ttl_sec: 6 * 3600,
            blacklist_limit: 8,
            healthy_uptime_sec: 0,
        }
    }
}

/// Optional partition rotation policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionFallback {
    /// Ordered, preferred-first. Overrides the template's partition list.
    pub partitions: Vec<String>,
    /// Failures tolerated on one partition before advancing to the next.
    pub retry_per_partition: u32,
    /// After this long away, counters reset and the preferred partition is
    /// tried again.
    pub reset_to_preferred_sec: u64,
}

/// Everything persisted about one run (`meta.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: RunId,
    pub run_mode: RunMode,

    // Submission template
    pub batch_script: PathBuf,
    #[serde(default)]
    pub sbatch_args: Vec<String>,
    /// Ordered partition list, preferred first. Empty means scheduler default.
    #[serde(default)]
    pub partitions: Vec<String>,
    #[serde(default)]
    pub policy: RunPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_fallback: Option<PartitionFallback>,

    // Runtime linkage, owned by the supervisor
    #[serde(default)]
    pub state: MachineState,
    #[serde(default)]
    pub job_id: Option<u64>,
    #[serde(default)]
    pub partition: Option<String>,
    #[serde(default)]
    pub submission_count: u32,
    #[serde(default)]
    pub last_submit_at: Option<u64>,
    #[serde(default)]
    pub consecutive_failures: u32,
    #[serde(default)]
    pub partition_failure_counts: IndexMap<String, u32>,
    #[serde(default)]
    pub preferred_last_tried_at: Option<u64>,
    #[serde(default)]
    pub run_started_at: Option<u64>,
    /// Earliest epoch second at which the next submission may happen;
    /// `None` while in backoff means hold indefinitely (paused).
    #[serde(default)]
    pub next_submit_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_followup: Option<CancelFollowup>,
    /// Consecutive UNKNOWN observations while waiting for a cancel to land.
    #[serde(default)]
    pub unknown_streak: u32,
    /// Last restart token consumed from `control.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_restart_token: Option<String>,
}

impl RunMeta {
    /// Fresh record for a new run; runtime linkage starts empty.
    pub fn new(run_id: RunId, run_mode: RunMode, batch_script: impl Into<PathBuf>) -> Self {
        Self {
            run_id,
            run_mode,
            batch_script: batch_script.into(),
            sbatch_args: Vec::new(),
            partitions: Vec::new(),
            policy: RunPolicy::default(),
            partition_fallback: None,
            state: MachineState::Init,
            job_id: None,
            partition: None,
            submission_count: 0,
            last_submit_at: None,
            consecutive_failures: 0,
            partition_failure_counts: IndexMap::new(),
            preferred_last_tried_at: None,
            run_started_at: None,
            next_submit_at: None,
            cancel_followup: None,
            unknown_streak: 0,
            last_restart_token: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state == MachineState::Terminal
    }

    /// The partition list rotation operates over: the fallback block's list
    /// when present, else the template's.
    pub fn effective_partitions(&self) -> &[String] {
        match &self.partition_fallback {
            Some(fb) => &fb.partitions,
            None => &self.partitions,
        }
    }

    /// A submission is in flight or occupying resources.
    pub fn has_live_job(&self) -> bool {
        self.job_id.is_some()
            && matches!(
                self.state,
                MachineState::SubmitPending
                    | MachineState::Queued
                    | MachineState::Running
                    | MachineState::Cancelling
            )
    }

    /// Record a failure against the partition the failed submission used.
    pub fn record_partition_failure(&mut self) {
        if let Some(partition) = self.partition.clone() {
            *self.partition_failure_counts.entry(partition).or_insert(0) += 1;
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
