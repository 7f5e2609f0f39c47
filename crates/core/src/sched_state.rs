// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Normalized scheduler job state.
//!
//! Slurm reports a wide vocabulary of states through `squeue` and `sacct`;
//! the supervisor only distinguishes the handful that drive transitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduler state of one allocation, normalized from Slurm's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Timeout,
    Preempted,
    Unknown,
}

impl SchedState {
    /// Normalize a raw Slurm state string.
    ///
    /// Handles `sacct` suffixes ("CANCELLED+", "CANCELLED by 1234") by
    /// looking at the first token only.
    pub fn from_slurm(raw: &str) -> Self {
        let token = raw
            .split_whitespace()
            .next()
            .unwrap_or("")
            .trim_end_matches('+');
        match token {
            "PENDING" | "CONFIGURING" => SchedState::Pending,
            "RUNNING" | "COMPLETING" => SchedState::Running,
            "COMPLETED" => SchedState::Completed,
            "FAILED" | "NODE_FAIL" | "BOOT_FAIL" => SchedState::Failed,
            "TIMEOUT" => SchedState::Timeout,
            "PREEMPTED" => SchedState::Preempted,
            "CANCELLED" => SchedState::Cancelled,
            _ => SchedState::Unknown,
        }
    }

    /// The allocation still occupies (or is waiting for) resources.
    pub fn is_live(self) -> bool {
        matches!(self, SchedState::Pending | SchedState::Running)
    }

    /// The scheduler has positively reported the allocation as finished.
    pub fn is_gone(self) -> bool {
        matches!(
            self,
            SchedState::Completed
                | SchedState::Failed
                | SchedState::Cancelled
                | SchedState::Timeout
                | SchedState::Preempted
        )
    }
}

impl fmt::Display for SchedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchedState::Pending => "pending",
            SchedState::Running => "running",
            SchedState::Completed => "completed",
            SchedState::Failed => "failed",
            SchedState::Cancelled => "cancelled",
            SchedState::Timeout => "timeout",
            SchedState::Preempted => "preempted",
            SchedState::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
#[path = "sched_state_tests.rs"]
mod tests;
