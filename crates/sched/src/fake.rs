// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted scheduler for deterministic tests.
//!
//! Tests set per-job observations and the fake plays them back through the
//! [`SchedClient`] interface; every submission and cancellation is recorded
//! for assertions.

use crate::call::CallOutcome;
use crate::slurm::SchedClient;
use crate::snapshot::{JobObservation, SubmitRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use shepherd_core::SchedState;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct FakeInner {
    next_job_id: u64,
    observations: HashMap<u64, JobObservation>,
    submissions: Vec<SubmitRequest>,
    cancels: Vec<u64>,
    query_outage: bool,
    submit_outage: bool,
}

/// In-memory [`SchedClient`] with test-controlled behavior.
#[derive(Debug, Clone, Default)]
pub struct FakeScheduler {
    inner: Arc<Mutex<FakeInner>>,
}

impl FakeScheduler {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.inner.lock().next_job_id = 1000;
        fake
    }

    /// Script the scheduler's view of a job.
    pub fn set_observation(&self, job_id: u64, obs: JobObservation) {
        self.inner.lock().observations.insert(job_id, obs);
    }

    /// Shorthand: script only the state.
    pub fn set_state(&self, job_id: u64, state: SchedState) {
        self.set_observation(job_id, JobObservation::new(state));
    }

    /// Make the job vanish from both squeue and sacct (reads as UNKNOWN).
    pub fn forget(&self, job_id: u64) {
        self.inner.lock().observations.remove(&job_id);
    }

    /// Make every query time out until turned off again.
    pub fn set_query_outage(&self, outage: bool) {
        self.inner.lock().query_outage = outage;
    }

    /// Make the next submissions fail as transient until turned off again.
    pub fn set_submit_outage(&self, outage: bool) {
        self.inner.lock().submit_outage = outage;
    }

    /// Every submission seen so far, oldest first.
    pub fn submissions(&self) -> Vec<SubmitRequest> {
        self.inner.lock().submissions.clone()
    }

    /// Every cancelled job id, oldest first.
    pub fn cancels(&self) -> Vec<u64> {
        self.inner.lock().cancels.clone()
    }

    /// The job id the next successful submission will return.
    pub fn peek_next_job_id(&self) -> u64 {
        self.inner.lock().next_job_id
    }
}

#[async_trait]
impl SchedClient for FakeScheduler {
    async fn submit(&self, req: &SubmitRequest) -> CallOutcome<u64> {
        let mut inner = self.inner.lock();
        if inner.submit_outage {
            return CallOutcome::Transient("sbatch: scripted outage".into());
        }
        let job_id = inner.next_job_id;
        inner.next_job_id += 1;
        inner.submissions.push(req.clone());
        // A fresh submission starts pending unless the test scripts otherwise.
        inner
            .observations
            .entry(job_id)
            .or_insert_with(|| JobObservation {
                state: SchedState::Pending,
                node: None,
                partition: req.partition.clone(),
                exit_code: None,
            });
        CallOutcome::Ok(job_id)
    }

    async fn query_live(&self, job_ids: &[u64]) -> CallOutcome<Vec<(u64, JobObservation)>> {
        let inner = self.inner.lock();
        if inner.query_outage {
            return CallOutcome::Timeout;
        }
        CallOutcome::Ok(
            job_ids
                .iter()
                .filter_map(|id| {
                    inner
                        .observations
                        .get(id)
                        .filter(|obs| obs.state.is_live())
                        .map(|obs| (*id, obs.clone()))
                })
                .collect(),
        )
    }

    async fn query_finished(&self, job_ids: &[u64]) -> CallOutcome<Vec<(u64, JobObservation)>> {
        let inner = self.inner.lock();
        if inner.query_outage {
            return CallOutcome::Timeout;
        }
        CallOutcome::Ok(
            job_ids
                .iter()
                .filter_map(|id| {
                    inner
                        .observations
                        .get(id)
                        .filter(|obs| obs.state.is_gone())
                        .map(|obs| (*id, obs.clone()))
                })
                .collect(),
        )
    }

    async fn cancel(&self, job_id: u64) -> CallOutcome<()> {
        let mut inner = self.inner.lock();
        inner.cancels.push(job_id);
        let partition = inner
            .observations
            .get(&job_id)
            .and_then(|obs| obs.partition.clone());
        inner.observations.insert(
            job_id,
            JobObservation {
                state: SchedState::Cancelled,
                node: None,
                partition,
                exit_code: None,
            },
        );
        CallOutcome::Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
