// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-written control signals (`control.json`).
//!
//! CLI or TUI processes write this file atomically; the supervisor only
//! reads it. Restart delivery uses a token rather than a flag so the
//! supervisor can tell a fresh request from one it already honored.

use serde::{Deserialize, Serialize};

/// Contents of `control.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSignals {
    pub paused: bool,
    pub stop_requested: bool,
    /// Monotonic restart request: any value differing from the one the
    /// supervisor last consumed triggers a cancel-and-resubmit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_restart_token: Option<String>,
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
