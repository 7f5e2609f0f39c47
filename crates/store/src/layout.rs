// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State-directory layout.
//!
//! ```text
//! <state_root>/
//!   runs/<run_id>/
//!     meta.json          control.json       heartbeat
//!     progress.json?     failure.json?      final.json?
//!     ended.json?        badnode_events.log
//!   blacklist.json
//!   locks/<run_id>.lock
//!   daemon.pid
//! ```
//!
//! This layout is a persisted contract shared with the wrapper and any
//! external CLI/TUI; paths are computed here and nowhere else.

use shepherd_core::RunId;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("could not determine state directory (set SHEPHERD_STATE_DIR or HOME)")]
    NoStateDir,
}

/// Path schema rooted at one state directory.
#[derive(Debug, Clone)]
pub struct StateLayout {
    root: PathBuf,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the state root from the environment.
    ///
    /// `SHEPHERD_STATE_DIR` takes priority (used by tests for isolation),
    /// then `$XDG_STATE_HOME/shepherd`, then `~/.local/state/shepherd`.
    pub fn resolve() -> Result<Self, LayoutError> {
        if let Ok(dir) = std::env::var("SHEPHERD_STATE_DIR") {
            return Ok(Self::new(dir));
        }
        if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
            return Ok(Self::new(PathBuf::from(xdg).join("shepherd")));
        }
        let home = std::env::var("HOME").map_err(|_| LayoutError::NoStateDir)?;
        Ok(Self::new(
            PathBuf::from(home).join(".local/state/shepherd"),
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.root.join("runs")
    }

    pub fn run_dir(&self, run_id: &RunId) -> PathBuf {
        self.runs_dir().join(run_id.as_str())
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    pub fn run_lock_path(&self, run_id: &RunId) -> PathBuf {
        self.locks_dir().join(format!("{run_id}.lock"))
    }

    pub fn blacklist_path(&self) -> PathBuf {
        self.root.join("blacklist.json")
    }

    pub fn blacklist_lock_path(&self) -> PathBuf {
        self.locks_dir().join("blacklist.lock")
    }

    pub fn daemon_pid_path(&self) -> PathBuf {
        self.root.join("daemon.pid")
    }

    pub fn daemon_log_path(&self) -> PathBuf {
        self.root.join("daemon.log")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    // Per-run files

    pub fn meta_path(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join("meta.json")
    }

    pub fn control_path(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join("control.json")
    }

    pub fn heartbeat_path(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join("heartbeat")
    }

    pub fn progress_path(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join("progress.json")
    }

    pub fn failure_path(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join("failure.json")
    }

    pub fn final_path(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join("final.json")
    }

    pub fn ended_path(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join("ended.json")
    }

    pub fn badnode_log_path(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join("badnode_events.log")
    }

    /// Create the top-level directories the daemon needs at startup.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.runs_dir())?;
        std::fs::create_dir_all(self.locks_dir())?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
