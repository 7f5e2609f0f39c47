// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The terminal marker (`ended.json`).
//!
//! Written exactly once by the supervisor; its presence forbids any further
//! state transitions for the run.

use crate::run::RunMode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a run reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndedReason {
    Success,
    MaxRetries,
    WindowExpired,
    StoppedManual,
    FatalError,
}

impl fmt::Display for EndedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EndedReason::Success => "success",
            EndedReason::MaxRetries => "max_retries",
            EndedReason::WindowExpired => "window_expired",
            EndedReason::StoppedManual => "stopped_manual",
            EndedReason::FatalError => "fatal_error",
        };
        write!(f, "{s}")
    }
}

/// Contents of `ended.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndedMarker {
    pub reason: EndedReason,
    /// Epoch seconds when the run ended.
    pub at: u64,
    pub run_mode: RunMode,
}

#[cfg(test)]
#[path = "ended_tests.rs"]
mod tests;
