// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-tick scheduler snapshot.
//!
//! All scheduler queries in one tick collapse into at most one `squeue`
//! call plus one `sacct` call for the job ids `squeue` no longer knows.
//! The resulting snapshot is the single consistent view every run's state
//! machine sees that tick; decisions never re-query.

use crate::call::CallOutcome;
use crate::slurm::SchedClient;
use shepherd_core::SchedState;
use std::collections::HashMap;
use std::path::PathBuf;

/// One submission, fully specified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub batch_script: PathBuf,
    pub partition: Option<String>,
    /// Node names for `--exclude`, already TTL-filtered and capped.
    pub exclude: Vec<String>,
    pub extra_args: Vec<String>,
}

/// What the scheduler reported about one job id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobObservation {
    pub state: SchedState,
    pub node: Option<String>,
    pub partition: Option<String>,
    /// Wrapper exit code, when the accounting database has it.
    pub exit_code: Option<i32>,
}

impl JobObservation {
    pub fn new(state: SchedState) -> Self {
        Self {
            state,
            node: None,
            partition: None,
            exit_code: None,
        }
    }
}

/// Consistent view of every known job id for one tick.
#[derive(Debug, Clone, Default)]
pub struct SchedSnapshot {
    jobs: HashMap<u64, JobObservation>,
}

impl SchedSnapshot {
    /// Build the tick's snapshot: one `squeue` over all ids, then one
    /// `sacct` over the ids `squeue` omitted. No ids, no calls.
    ///
    /// A timed-out or failed query simply leaves its ids unobserved; they
    /// read as UNKNOWN and the affected runs skip their decision this tick.
    pub async fn gather<S: SchedClient>(client: &S, job_ids: &[u64]) -> Self {
        let mut snapshot = SchedSnapshot::default();
        if job_ids.is_empty() {
            return snapshot;
        }

        match client.query_live(job_ids).await {
            CallOutcome::Ok(rows) => {
                for (job_id, obs) in rows {
                    snapshot.jobs.insert(job_id, obs);
                }
            }
            outcome => {
                tracing::warn!(?outcome, "live scheduler query failed, snapshot degraded");
                return snapshot;
            }
        }

        let finished: Vec<u64> = job_ids
            .iter()
            .copied()
            .filter(|id| !snapshot.jobs.contains_key(id))
            .collect();
        if finished.is_empty() {
            return snapshot;
        }

        match client.query_finished(&finished).await {
            CallOutcome::Ok(rows) => {
                for (job_id, obs) in rows {
                    snapshot.jobs.insert(job_id, obs);
                }
            }
            outcome => {
                tracing::warn!(?outcome, "accounting query failed, finished jobs unobserved");
            }
        }

        snapshot
    }

    pub fn insert(&mut self, job_id: u64, obs: JobObservation) {
        self.jobs.insert(job_id, obs);
    }

    pub fn observation(&self, job_id: u64) -> Option<&JobObservation> {
        self.jobs.get(&job_id)
    }

    /// State for a job id; ids the scheduler did not report are UNKNOWN.
    pub fn state(&self, job_id: u64) -> SchedState {
        self.jobs
            .get(&job_id)
            .map(|obs| obs.state)
            .unwrap_or(SchedState::Unknown)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
