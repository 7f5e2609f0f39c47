// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed access to every per-run state file.
//!
//! Reads are lock-free and corruption-tolerant: a file that fails to parse
//! is renamed aside with a `.corrupt.<nanos>` suffix (preserving evidence)
//! and reported as missing, so the supervisor keeps ticking no matter what
//! is on disk. Writes go through the atomic primitive.

use crate::atomic::{epoch_nanos, write_atomic, write_json_atomic};
use crate::layout::StateLayout;
use crate::lock::FileLock;
use serde::de::DeserializeOwned;
use shepherd_core::{
    ControlSignals, EndedMarker, FailureRecord, Heartbeat, Progress, RunId, RunMeta,
};
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("run already exists: {0}")]
    RunExists(RunId),
    #[error("run id not filesystem-safe: {0:?}")]
    UnsafeRunId(String),
}

/// Handle to the runs/ tree of one state root.
#[derive(Debug, Clone)]
pub struct RunStore {
    layout: StateLayout,
}

impl RunStore {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    /// All run ids present on disk, in directory order.
    pub fn list_runs(&self) -> Result<Vec<RunId>, StoreError> {
        let runs_dir = self.layout.runs_dir();
        let entries = match std::fs::read_dir(&runs_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                ids.push(RunId::new(name));
            }
        }
        Ok(ids)
    }

    /// Register a new run: its directory, `meta.json`, and an empty
    /// `control.json`.
    pub fn create_run(&self, meta: &RunMeta) -> Result<(), StoreError> {
        if !meta.run_id.is_filesystem_safe() {
            return Err(StoreError::UnsafeRunId(meta.run_id.to_string()));
        }
        let dir = self.layout.run_dir(&meta.run_id);
        if dir.exists() {
            return Err(StoreError::RunExists(meta.run_id.clone()));
        }
        std::fs::create_dir_all(&dir)?;
        self.save_meta(meta)?;
        self.save_control(&meta.run_id, &ControlSignals::default())?;
        Ok(())
    }

    /// Take the run's tick lock without blocking.
    pub fn try_lock_run(&self, run_id: &RunId) -> io::Result<Option<FileLock>> {
        FileLock::try_exclusive(&self.layout.run_lock_path(run_id))
    }

    pub fn load_meta(&self, run_id: &RunId) -> Result<Option<RunMeta>, StoreError> {
        self.load_json(&self.layout.meta_path(run_id))
    }

    pub fn save_meta(&self, meta: &RunMeta) -> Result<(), StoreError> {
        write_json_atomic(&self.layout.meta_path(&meta.run_id), meta)?;
        Ok(())
    }

    /// Control signals; missing or corrupt files read as "no signals".
    pub fn load_control(&self, run_id: &RunId) -> Result<ControlSignals, StoreError> {
        Ok(self
            .load_json(&self.layout.control_path(run_id))?
            .unwrap_or_default())
    }

    pub fn save_control(
        &self,
        run_id: &RunId,
        control: &ControlSignals,
    ) -> Result<(), StoreError> {
        write_json_atomic(&self.layout.control_path(run_id), control)?;
        Ok(())
    }

    pub fn load_heartbeat(&self, run_id: &RunId) -> Result<Option<Heartbeat>, StoreError> {
        let path = self.layout.heartbeat_path(run_id);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match Heartbeat::parse(&text) {
            Ok(hb) => Ok(Some(hb)),
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "quarantining corrupt heartbeat");
                quarantine(&path);
                Ok(None)
            }
        }
    }

    pub fn write_heartbeat(&self, run_id: &RunId, hb: Heartbeat) -> Result<(), StoreError> {
        write_atomic(&self.layout.heartbeat_path(run_id), hb.encode().as_bytes())?;
        Ok(())
    }

    pub fn load_progress(&self, run_id: &RunId) -> Result<Option<Progress>, StoreError> {
        self.load_json(&self.layout.progress_path(run_id))
    }

    pub fn load_failure(&self, run_id: &RunId) -> Result<Option<FailureRecord>, StoreError> {
        self.load_json(&self.layout.failure_path(run_id))
    }

    pub fn write_failure(
        &self,
        run_id: &RunId,
        record: &FailureRecord,
    ) -> Result<(), StoreError> {
        write_json_atomic(&self.layout.failure_path(run_id), record)?;
        Ok(())
    }

    pub fn final_exists(&self, run_id: &RunId) -> bool {
        self.layout.final_path(run_id).exists()
    }

    /// The success sentinel. Content is an empty object so every `.json`
    /// file in the tree is valid JSON; presence alone carries the meaning.
    pub fn write_final(&self, run_id: &RunId) -> Result<(), StoreError> {
        write_atomic(&self.layout.final_path(run_id), b"{}\n")?;
        Ok(())
    }

    pub fn load_ended(&self, run_id: &RunId) -> Result<Option<EndedMarker>, StoreError> {
        self.load_json(&self.layout.ended_path(run_id))
    }

    pub fn write_ended(&self, run_id: &RunId, marker: &EndedMarker) -> Result<(), StoreError> {
        write_json_atomic(&self.layout.ended_path(run_id), marker)?;
        Ok(())
    }

    /// Append one line to the run's bad-node forensic log, stamped with the
    /// wall clock.
    pub fn append_badnode_event(&self, run_id: &RunId, line: &str) -> Result<(), StoreError> {
        use std::io::Write;
        let path = self.layout.badnode_log_path(run_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let stamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        writeln!(file, "{stamp} {line}")?;
        Ok(())
    }

    /// Load a JSON state file, quarantining it on parse failure.
    fn load_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, StoreError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "quarantining corrupt state file");
                quarantine(path);
                Ok(None)
            }
        }
    }
}

/// Rename a damaged file aside, preserving it as evidence. Best-effort: if
/// the rename fails there is nothing better to do than leave it in place.
fn quarantine(path: &Path) {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return;
    };
    let quarantined = path.with_file_name(format!("{name}.corrupt.{}", epoch_nanos()));
    let _ = std::fs::rename(path, &quarantined);
}

#[cfg(test)]
#[path = "run_store_tests.rs"]
mod tests;
