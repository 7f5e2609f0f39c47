// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor tunables.
//!
//! Per-run policy lives in each run's `meta.json`; this is the daemon-wide
//! configuration, read from `<state_root>/config.toml` when present.

use crate::machine::Tunables;
use serde::Deserialize;
use shepherd_store::StateLayout;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Target tick period.
    pub tick_period: Duration,
    /// Bounded per-tick worker pool: how many runs advance concurrently.
    pub worker_pool: usize,
    /// Hard wall-clock timeout for each scheduler CLI call.
    pub call_timeout: Duration,
    /// How long a job may read UNKNOWN after submission before the run is
    /// classified as failed.
    pub unknown_after_sec: u64,
    /// Consecutive UNKNOWN observations that confirm a cancelled job gone.
    pub cancel_unknown_streak: u32,
    /// Blacklist TTL for trespasser strikes (hardware strikes use the
    /// run's own `blacklist_ttl_sec`).
    pub blacklist_ttl_trespass_sec: u64,
    /// Daemon log size that triggers rotation at startup.
    pub log_rotate_bytes: u64,
    /// Rotated log generations kept (`daemon.log.1` ..); 0 disables
    /// rotation.
    pub log_keep_files: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        let tick_period = Duration::from_secs(5);
        Self {
            worker_pool: 8,
            call_timeout: Duration::from_secs(15),
            // 10 ticks of silence before an unlinked job counts as lost
            unknown_after_sec: tick_period.as_secs() * 10,
            cancel_unknown_streak: 3,
            blacklist_ttl_trespass_sec: 1800,
            log_rotate_bytes: 10 * 1024 * 1024,
            log_keep_files: 3,
            tick_period,
        }
    }
}

/// On-disk form: every field optional, unset fields keep their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    tick_period_sec: Option<u64>,
    worker_pool: Option<usize>,
    call_timeout_sec: Option<u64>,
    unknown_after_sec: Option<u64>,
    cancel_unknown_streak: Option<u32>,
    blacklist_ttl_trespass_sec: Option<u64>,
    log_rotate_bytes: Option<u64>,
    log_keep_files: Option<u32>,
}

impl SupervisorConfig {
    /// Load from `config.toml` under the state root. A missing file means
    /// defaults; a malformed file warns and means defaults too — bad
    /// config must not keep the daemon down.
    pub fn load(layout: &StateLayout) -> Self {
        let path = layout.config_path();
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(_) => return Self::from_file(ConfigFile::default()),
        };
        match toml::from_str::<ConfigFile>(&text) {
            Ok(file) => Self::from_file(file),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring malformed config.toml");
                Self::from_file(ConfigFile::default())
            }
        }
    }

    fn from_file(file: ConfigFile) -> Self {
        let defaults = Self::default();
        let tick_period = file
            .tick_period_sec
            .map(Duration::from_secs)
            .unwrap_or(defaults.tick_period);
        Self {
            worker_pool: file.worker_pool.unwrap_or(defaults.worker_pool).max(1),
            call_timeout: file
                .call_timeout_sec
                .map(Duration::from_secs)
                .unwrap_or(defaults.call_timeout),
            unknown_after_sec: file
                .unknown_after_sec
                .unwrap_or(tick_period.as_secs() * 10),
            cancel_unknown_streak: file
                .cancel_unknown_streak
                .unwrap_or(defaults.cancel_unknown_streak)
                .max(1),
            blacklist_ttl_trespass_sec: file
                .blacklist_ttl_trespass_sec
                .unwrap_or(defaults.blacklist_ttl_trespass_sec),
            log_rotate_bytes: file
                .log_rotate_bytes
                .unwrap_or(defaults.log_rotate_bytes)
                .max(1),
            log_keep_files: file.log_keep_files.unwrap_or(defaults.log_keep_files),
            tick_period,
        }
    }

    /// The subset the pure state machine needs.
    pub fn tunables(&self) -> Tunables {
        Tunables {
            unknown_after_sec: self.unknown_after_sec,
            cancel_unknown_streak: self.cancel_unknown_streak,
            blacklist_ttl_trespass_sec: self.blacklist_ttl_trespass_sec,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
