// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The heartbeat file: one decimal epoch-seconds integer, newline-terminated.
//!
//! Written atomically by the wrapper on a fixed cadence; read by the
//! supervisor to detect hung workloads.

use thiserror::Error;

/// Last-write instant of a run's heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat(pub u64);

#[derive(Debug, Error)]
#[error("invalid heartbeat payload: {0:?}")]
pub struct HeartbeatParseError(String);

impl Heartbeat {
    /// Parse the on-disk representation.
    pub fn parse(text: &str) -> Result<Self, HeartbeatParseError> {
        text.trim()
            .parse::<u64>()
            .map(Heartbeat)
            .map_err(|_| HeartbeatParseError(text.chars().take(32).collect()))
    }

    /// On-disk representation: decimal seconds plus trailing newline.
    pub fn encode(self) -> String {
        format!("{}\n", self.0)
    }

    /// Stale iff age strictly exceeds the grace period.
    pub fn is_stale(self, now: u64, grace_sec: u64) -> bool {
        now.saturating_sub(self.0) > grace_sec
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
