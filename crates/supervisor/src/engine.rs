// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The tick engine.
//!
//! One tick: list runs, take a single batched scheduler snapshot, then
//! advance every run concurrently under its per-run lock through a bounded
//! worker pool. A run whose lock is contended, or whose state files are
//! damaged, is skipped for the tick — the supervisor never crashes on one
//! run's bad state.

use crate::config::SupervisorConfig;
use crate::effect::Effect;
use crate::machine::{self, TickInputs};
use rand::Rng;
use shepherd_core::{Clock, EndedMarker, MachineState, RunId, RunMeta};
use shepherd_sched::{CallOutcome, SchedClient, SchedSnapshot, SubmitRequest};
use shepherd_store::{BlacklistStore, RunStore, StoreError};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// What one tick did, for logging and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub runs_seen: usize,
    pub advanced: usize,
    pub terminal: usize,
    pub lock_skipped: usize,
    pub quarantined: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy)]
enum RunOutcome {
    Advanced,
    Terminal,
    LockContended,
    Quarantined,
    Error,
}

/// Long-lived supervisor engine: owns the stores, the scheduler client,
/// and the worker pool.
pub struct Engine<S, C> {
    store: RunStore,
    blacklist: BlacklistStore,
    sched: S,
    clock: C,
    config: SupervisorConfig,
    pool: Arc<Semaphore>,
}

impl<S, C> Engine<S, C>
where
    S: SchedClient + 'static,
    C: Clock + 'static,
{
    pub fn new(
        store: RunStore,
        blacklist: BlacklistStore,
        sched: S,
        clock: C,
        config: SupervisorConfig,
    ) -> Arc<Self> {
        let pool = Arc::new(Semaphore::new(config.worker_pool));
        Arc::new(Self {
            store,
            blacklist,
            sched,
            clock,
            config,
            pool,
        })
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    pub fn blacklist(&self) -> &BlacklistStore {
        &self.blacklist
    }

    /// Run one tick over every known run.
    pub async fn tick(self: &Arc<Self>) -> TickReport {
        let mut report = TickReport::default();

        let run_ids = match self.store.list_runs() {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "cannot list runs, skipping tick");
                report.errors += 1;
                return report;
            }
        };
        report.runs_seen = run_ids.len();

        // Lock-free pre-pass: collect the job ids the snapshot must cover.
        let mut job_ids = Vec::new();
        for run_id in &run_ids {
            if let Ok(Some(meta)) = self.store.load_meta(run_id) {
                if !meta.is_terminal() {
                    if let Some(job_id) = meta.job_id {
                        job_ids.push(job_id);
                    }
                }
            }
        }

        let snapshot = Arc::new(SchedSnapshot::gather(&self.sched, &job_ids).await);
        debug!(
            runs = run_ids.len(),
            jobs_queried = job_ids.len(),
            jobs_reported = snapshot.len(),
            "tick snapshot"
        );

        let mut tasks = JoinSet::new();
        for run_id in run_ids {
            let engine = Arc::clone(self);
            let snapshot = Arc::clone(&snapshot);
            tasks.spawn(async move {
                let _permit = engine.pool.acquire().await;
                engine.advance_run(&run_id, &snapshot).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(RunOutcome::Advanced) => report.advanced += 1,
                Ok(RunOutcome::Terminal) => report.terminal += 1,
                Ok(RunOutcome::LockContended) => report.lock_skipped += 1,
                Ok(RunOutcome::Quarantined) => report.quarantined += 1,
                Ok(RunOutcome::Error) => report.errors += 1,
                Err(e) => {
                    error!(error = %e, "run worker panicked");
                    report.errors += 1;
                }
            }
        }
        report
    }

    /// Advance a single run by one machine step, under its lock.
    async fn advance_run(&self, run_id: &RunId, snapshot: &SchedSnapshot) -> RunOutcome {
        let lock = match self.store.try_lock_run(run_id) {
            Ok(Some(lock)) => lock,
            Ok(None) => {
                debug!(%run_id, "run lock contended, skipping tick");
                return RunOutcome::LockContended;
            }
            Err(e) => {
                warn!(%run_id, error = %e, "cannot take run lock");
                return RunOutcome::Error;
            }
        };
        let outcome = self.advance_locked(run_id, snapshot).await;
        drop(lock);
        outcome
    }

    async fn advance_locked(&self, run_id: &RunId, snapshot: &SchedSnapshot) -> RunOutcome {
        // Terminal short-circuit: ended.json forbids further transitions.
        match self.store.load_ended(run_id) {
            Ok(Some(_)) => {
                if let Ok(Some(mut meta)) = self.store.load_meta(run_id) {
                    if !meta.is_terminal() {
                        meta.state = MachineState::Terminal;
                        let _ = self.store.save_meta(&meta);
                    }
                }
                return RunOutcome::Terminal;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(%run_id, error = %e, "cannot read ended marker");
                return RunOutcome::Error;
            }
        }

        let mut meta = match self.store.load_meta(run_id) {
            Ok(Some(meta)) => meta,
            Ok(None) => {
                // Missing or quarantined: nothing to decide this tick.
                warn!(%run_id, "meta.json missing or quarantined, skipping run");
                return RunOutcome::Quarantined;
            }
            Err(e) => {
                warn!(%run_id, error = %e, "cannot read meta.json");
                return RunOutcome::Error;
            }
        };
        if meta.is_terminal() {
            return RunOutcome::Terminal;
        }

        let inputs_result = self.gather_inputs(run_id);
        let (control, heartbeat, progress, failure, final_marker) = match inputs_result {
            Ok(parts) => parts,
            Err(e) => {
                warn!(%run_id, error = %e, "cannot read run state files");
                return RunOutcome::Error;
            }
        };

        let now = self.clock.epoch_secs();
        let observation = meta.job_id.and_then(|id| snapshot.observation(id)).cloned();
        let inputs = TickInputs {
            now,
            observation: observation.as_ref(),
            heartbeat,
            progress,
            failure,
            final_marker,
            control,
            jitter_frac: sample_jitter(),
        };

        let before = serde_json::to_string(&meta).unwrap_or_default();
        let effects = machine::advance(&mut meta, &inputs, &self.config.tunables());
        self.execute_effects(run_id, &mut meta, effects, now).await;

        // Idempotent ticks leave the file untouched.
        let after = serde_json::to_string(&meta).unwrap_or_default();
        if before != after {
            if let Err(e) = self.store.save_meta(&meta) {
                error!(%run_id, error = %e, "cannot persist run record");
                return RunOutcome::Error;
            }
        }
        RunOutcome::Advanced
    }

    #[allow(clippy::type_complexity)]
    fn gather_inputs(
        &self,
        run_id: &RunId,
    ) -> Result<
        (
            shepherd_core::ControlSignals,
            Option<shepherd_core::Heartbeat>,
            Option<shepherd_core::Progress>,
            Option<shepherd_core::FailureRecord>,
            bool,
        ),
        StoreError,
    > {
        Ok((
            self.store.load_control(run_id)?,
            self.store.load_heartbeat(run_id)?,
            self.store.load_progress(run_id)?,
            self.store.load_failure(run_id)?,
            self.store.final_exists(run_id),
        ))
    }

    /// Perform the machine's side effects, updating the record where an
    /// effect's result feeds back into it (submission bookkeeping).
    async fn execute_effects(
        &self,
        run_id: &RunId,
        meta: &mut RunMeta,
        effects: Vec<Effect>,
        now: u64,
    ) {
        for effect in effects {
            match effect {
                Effect::Submit { partition } => {
                    self.submit(run_id, meta, partition, now).await;
                }
                Effect::Cancel { job_id } => match self.sched.cancel(job_id).await {
                    CallOutcome::Ok(()) => {
                        info!(%run_id, job_id, "cancel requested");
                    }
                    outcome => {
                        // The cancel confirmation loop retries next tick.
                        warn!(%run_id, job_id, ?outcome, "cancel did not land");
                    }
                },
                Effect::WriteEnded { reason } => {
                    let marker = EndedMarker {
                        reason,
                        at: now,
                        run_mode: meta.run_mode,
                    };
                    match self.store.write_ended(run_id, &marker) {
                        Ok(()) => info!(%run_id, %reason, "run ended"),
                        Err(e) => {
                            // Failing to record a terminal outcome is the one
                            // thing the supervisor may not shrug off silently.
                            error!(%run_id, %reason, error = %e, "cannot write ended marker");
                        }
                    }
                }
                Effect::BlacklistNode {
                    node,
                    ttl_sec,
                    kind,
                    reason,
                } => {
                    let result = self
                        .blacklist
                        .update(now, |bl| bl.insert(&node, &reason, ttl_sec, now));
                    match result {
                        Ok(_) => {
                            info!(%run_id, node, %kind, ttl_sec, "node blacklisted");
                            let line =
                                format!("blacklist {node} kind={kind} ttl={ttl_sec}s reason={reason:?}");
                            if let Err(e) = self.store.append_badnode_event(run_id, &line) {
                                warn!(%run_id, error = %e, "cannot append badnode event");
                            }
                        }
                        Err(e) => {
                            warn!(%run_id, node, error = %e, "cannot update blacklist");
                        }
                    }
                }
            }
        }
    }

    async fn submit(
        &self,
        run_id: &RunId,
        meta: &mut RunMeta,
        partition: Option<String>,
        now: u64,
    ) {
        let exclude = self
            .blacklist
            .exclude_list(now, meta.policy.blacklist_limit)
            .unwrap_or_else(|e| {
                warn!(%run_id, error = %e, "cannot read blacklist, submitting without excludes");
                Vec::new()
            });
        let request = SubmitRequest {
            batch_script: meta.batch_script.clone(),
            partition: partition.clone(),
            exclude,
            extra_args: meta.sbatch_args.clone(),
        };

        match self.sched.submit(&request).await {
            CallOutcome::Ok(job_id) => {
                meta.job_id = Some(job_id);
                meta.partition = partition;
                meta.submission_count += 1;
                meta.last_submit_at = Some(now);
                meta.run_started_at.get_or_insert(now);
                meta.next_submit_at = None;
                meta.state = MachineState::Queued;
                info!(
                    %run_id,
                    job_id,
                    submission = meta.submission_count,
                    partition = meta.partition.as_deref().unwrap_or("-"),
                    "allocation submitted"
                );
            }
            CallOutcome::Timeout | CallOutcome::Transient(_) => {
                // Infrastructure hiccup, not a run failure: retry without
                // touching the failure counters.
                warn!(%run_id, "submission did not go through, retrying next backoff");
                meta.state = MachineState::Backoff;
                meta.next_submit_at = Some(now + meta.policy.backoff_base_sec.max(1));
            }
            CallOutcome::Fatal(message) => {
                error!(%run_id, message, "submission failed fatally, retrying slowly");
                meta.state = MachineState::Backoff;
                meta.next_submit_at = Some(now + meta.policy.backoff_max_sec.max(1));
            }
        }
    }
}

/// Backoff jitter sample in [-0.2, 0.2].
fn sample_jitter() -> f64 {
    rand::rng().random_range(-0.2..=0.2)
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
