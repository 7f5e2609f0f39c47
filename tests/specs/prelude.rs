// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared world-building for the scenario specs.

use std::sync::Arc;

pub use shepherd_core::{
    Clock, EndedReason, FailureKind, FailureRecord, FakeClock, Heartbeat, MachineState, RunId,
    RunMeta, RunMode, RunStatus, SchedState,
};
pub use shepherd_sched::{FakeScheduler, JobObservation, SchedSnapshot};
pub use shepherd_store::{BlacklistStore, RunStore, StateLayout};
pub use shepherd_supervisor::api;
pub use shepherd_supervisor::{ControlOp, Engine, SupervisorConfig, TickReport};

/// A supervisor, a scripted scheduler, a controllable clock, and a fresh
/// state root.
pub struct World {
    _dir: tempfile::TempDir,
    pub engine: Arc<Engine<FakeScheduler, FakeClock>>,
    pub sched: FakeScheduler,
    pub clock: FakeClock,
}

pub fn world() -> World {
    let dir = tempfile::tempdir().unwrap();
    let layout = StateLayout::new(dir.path());
    layout.ensure_dirs().unwrap();
    let sched = FakeScheduler::new();
    let clock = FakeClock::at(100_000);
    let engine = Engine::new(
        RunStore::new(layout.clone()),
        BlacklistStore::new(layout),
        sched.clone(),
        clock.clone(),
        SupervisorConfig::default(),
    );
    World {
        _dir: dir,
        engine,
        sched,
        clock,
    }
}

impl World {
    pub fn store(&self) -> &RunStore {
        self.engine.store()
    }

    pub fn blacklist(&self) -> &BlacklistStore {
        self.engine.blacklist()
    }

    pub async fn tick(&self) -> TickReport {
        self.engine.tick().await
    }

    pub fn create_run_once(&self, id: &str, max_retries: u32) -> RunId {
        let mut meta = RunMeta::new(RunId::new(id), RunMode::RunOnce, "/jobs/train.sbatch");
        meta.partitions = vec!["gpu-a100".into()];
        meta.policy.max_retries = max_retries;
        self.store().create_run(&meta).unwrap();
        RunId::new(id)
    }

    pub fn create_indefinite(&self, id: &str, keep_alive_sec: u64) -> RunId {
        let mut meta = RunMeta::new(RunId::new(id), RunMode::Indefinite, "/jobs/serve.sbatch");
        meta.partitions = vec!["gpu-a100".into()];
        meta.policy.keep_alive_sec = keep_alive_sec;
        self.store().create_run(&meta).unwrap();
        RunId::new(id)
    }

    pub fn meta(&self, run_id: &RunId) -> RunMeta {
        self.store().load_meta(run_id).unwrap().unwrap()
    }

    pub fn job_id(&self, run_id: &RunId) -> u64 {
        self.meta(run_id).job_id.unwrap()
    }

    /// Normalized status the CLI/TUI would render right now.
    pub async fn status(&self, run_id: &RunId) -> RunStatus {
        let job_ids: Vec<u64> = self.meta(run_id).job_id.into_iter().collect();
        let snapshot = SchedSnapshot::gather(&self.sched, &job_ids).await;
        api::get_status(self.store(), run_id, &snapshot, self.clock.epoch_secs())
            .unwrap()
            .unwrap()
            .status
    }

    /// Play the wrapper reporting a nonzero exit on a node, and the
    /// scheduler accounting for the dead job.
    pub fn wrapper_fails(&self, run_id: &RunId, exit_code: i32, node: &str) {
        let job_id = self.job_id(run_id);
        self.store()
            .write_failure(
                run_id,
                &FailureRecord {
                    exit_code,
                    kind: FailureKind::from_exit_code(exit_code),
                    node: node.into(),
                    job_id: Some(job_id),
                    timestamp: self.clock.epoch_secs(),
                    detail: format!("wrapper exited {exit_code}"),
                },
            )
            .unwrap();
        self.sched.set_observation(
            job_id,
            JobObservation {
                state: SchedState::Failed,
                node: Some(node.into()),
                partition: None,
                exit_code: Some(exit_code),
            },
        );
    }

    /// Play the wrapper finishing cleanly: the success sentinel plus
    /// COMPLETED accounting with exit 0.
    pub fn wrapper_succeeds(&self, run_id: &RunId, node: &str) {
        let job_id = self.job_id(run_id);
        self.store().write_final(run_id).unwrap();
        self.sched.set_observation(
            job_id,
            JobObservation {
                state: SchedState::Completed,
                node: Some(node.into()),
                partition: None,
                exit_code: Some(0),
            },
        );
    }

    pub fn heartbeat(&self, run_id: &RunId, at: u64) {
        self.store().write_heartbeat(run_id, Heartbeat(at)).unwrap();
    }

    pub fn set_running(&self, run_id: &RunId, node: &str) {
        let job_id = self.job_id(run_id);
        self.sched.set_observation(
            job_id,
            JobObservation {
                state: SchedState::Running,
                node: Some(node.into()),
                partition: None,
                exit_code: None,
            },
        );
    }

    /// Jump the clock to the run's scheduled resubmission time.
    pub fn advance_past_backoff(&self, run_id: &RunId) {
        let due = self.meta(run_id).next_submit_at.unwrap();
        if due > self.clock.epoch_secs() {
            self.clock.set(due);
        }
    }

    pub fn ended_reason(&self, run_id: &RunId) -> Option<EndedReason> {
        self.store()
            .load_ended(run_id)
            .unwrap()
            .map(|marker| marker.reason)
    }
}

/// Assert `delay` is `expected` give or take the ±20% backoff jitter.
pub fn assert_within_jitter(delay: u64, expected: u64) {
    let low = (expected as f64 * 0.8).floor() as u64;
    let high = (expected as f64 * 1.2).ceil() as u64;
    assert!(
        (low..=high).contains(&delay),
        "delay {delay} outside [{low}, {high}] (expected ~{expected})"
    );
}
