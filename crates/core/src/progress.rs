// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional workload-written progress record (`progress.json`).

use serde::{Deserialize, Serialize};

/// A workload's own claim of forward progress.
///
/// Consulted only when the file exists and the run's `progress_stall_sec`
/// is nonzero; a workload that never writes it is judged on heartbeat alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Epoch seconds of the last progress update.
    pub epoch: u64,
    /// Monotonic step counter (optimizer step, batch index, ...).
    pub step: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Progress {
    /// Stale iff staleness checking is enabled and the age strictly
    /// exceeds the threshold.
    pub fn is_stale(&self, now: u64, stall_sec: u64) -> bool {
        stall_sec > 0 && now.saturating_sub(self.epoch) > stall_sec
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
