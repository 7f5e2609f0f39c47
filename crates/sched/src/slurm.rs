// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slurm CLI client.
//!
//! Read-only contract with the site's Slurm installation:
//!
//! - submit: `sbatch [--exclude=...] [--partition=...] <script>`,
//!   parsing `Submitted batch job <N>` from stdout
//! - live query: `squeue --noheader -o "%i|%T|%R|%P|%N" --jobs=<ids>`
//! - finished query: `sacct -P -n -o JobID,State,ExitCode,NodeList -j <ids>`
//! - cancel: `scancel <id>`

use crate::call::{run_with_timeout, CallOutcome};
use crate::snapshot::{JobObservation, SubmitRequest};
use async_trait::async_trait;
use shepherd_core::SchedState;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Scheduler operations the supervisor needs.
#[async_trait]
pub trait SchedClient: Send + Sync {
    /// Submit an allocation; returns the scheduler job id.
    async fn submit(&self, req: &SubmitRequest) -> CallOutcome<u64>;

    /// Batched live query over all known job ids.
    async fn query_live(&self, job_ids: &[u64]) -> CallOutcome<Vec<(u64, JobObservation)>>;

    /// Batched accounting query for ids that left the live queue.
    async fn query_finished(&self, job_ids: &[u64]) -> CallOutcome<Vec<(u64, JobObservation)>>;

    /// Cancel one allocation.
    async fn cancel(&self, job_id: u64) -> CallOutcome<()>;
}

#[derive(Debug, Clone)]
pub struct SlurmConfig {
    /// Hard wall-clock timeout for every CLI call.
    pub call_timeout: Duration,
}

impl Default for SlurmConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(15),
        }
    }
}

/// Production client shelling out to the Slurm tools.
#[derive(Debug, Clone, Default)]
pub struct SlurmClient {
    config: SlurmConfig,
}

impl SlurmClient {
    pub fn new(config: SlurmConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SchedClient for SlurmClient {
    async fn submit(&self, req: &SubmitRequest) -> CallOutcome<u64> {
        let mut cmd = Command::new("sbatch");
        if !req.exclude.is_empty() {
            cmd.arg(format!("--exclude={}", req.exclude.join(",")));
        }
        if let Some(partition) = &req.partition {
            cmd.arg(format!("--partition={partition}"));
        }
        cmd.args(&req.extra_args);
        cmd.arg(&req.batch_script);

        let output = match run_with_timeout(cmd, self.config.call_timeout, "sbatch").await {
            CallOutcome::Ok(output) => output,
            other => return other.map(|_| 0),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return CallOutcome::Transient(format!("sbatch failed: {stderr}"));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_sbatch_stdout(&stdout) {
            Some(job_id) => {
                info!(job_id, partition = ?req.partition, "submitted batch job");
                CallOutcome::Ok(job_id)
            }
            None => CallOutcome::Transient(format!(
                "sbatch output not understood: {:?}",
                stdout.trim()
            )),
        }
    }

    async fn query_live(&self, job_ids: &[u64]) -> CallOutcome<Vec<(u64, JobObservation)>> {
        let ids = join_ids(job_ids);
        let mut cmd = Command::new("squeue");
        cmd.arg("--noheader")
            .arg("-o")
            .arg("%i|%T|%R|%P|%N")
            .arg(format!("--jobs={ids}"));

        let output = match run_with_timeout(cmd, self.config.call_timeout, "squeue").await {
            CallOutcome::Ok(output) => output,
            other => return other.map(|_| Vec::new()),
        };

        // squeue exits nonzero when asked about ids it has forgotten;
        // treat that the same as an empty listing and let sacct decide.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let rows: Vec<_> = stdout.lines().filter_map(parse_squeue_line).collect();
        debug!(queried = job_ids.len(), reported = rows.len(), "squeue snapshot");
        CallOutcome::Ok(rows)
    }

    async fn query_finished(&self, job_ids: &[u64]) -> CallOutcome<Vec<(u64, JobObservation)>> {
        let ids = join_ids(job_ids);
        let mut cmd = Command::new("sacct");
        cmd.arg("-P")
            .arg("-n")
            .arg("-o")
            .arg("JobID,State,ExitCode,NodeList")
            .arg("-j")
            .arg(&ids);

        let output = match run_with_timeout(cmd, self.config.call_timeout, "sacct").await {
            CallOutcome::Ok(output) => output,
            other => return other.map(|_| Vec::new()),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return CallOutcome::Transient(format!("sacct failed: {stderr}"));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        CallOutcome::Ok(stdout.lines().filter_map(parse_sacct_line).collect())
    }

    async fn cancel(&self, job_id: u64) -> CallOutcome<()> {
        let mut cmd = Command::new("scancel");
        cmd.arg(job_id.to_string());

        let output = match run_with_timeout(cmd, self.config.call_timeout, "scancel").await {
            CallOutcome::Ok(output) => output,
            other => return other.map(|_| ()),
        };

        if output.status.success() {
            info!(job_id, "cancelled batch job");
            CallOutcome::Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            CallOutcome::Transient(format!("scancel {job_id} failed: {stderr}"))
        }
    }
}

fn join_ids(job_ids: &[u64]) -> String {
    job_ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse `Submitted batch job <N>` (possibly followed by cluster chatter).
pub(crate) fn parse_sbatch_stdout(stdout: &str) -> Option<u64> {
    stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("Submitted batch job "))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|token| token.parse().ok())
}

/// Parse one `squeue` row: `id|STATE|reason|partition|nodelist`.
pub(crate) fn parse_squeue_line(line: &str) -> Option<(u64, JobObservation)> {
    let mut fields = line.trim().split('|');
    let job_id: u64 = fields.next()?.trim().parse().ok()?;
    let state = SchedState::from_slurm(fields.next()?.trim());
    let _reason = fields.next()?;
    let partition = non_empty(fields.next()?);
    let node = fields.next().and_then(non_empty);
    Some((
        job_id,
        JobObservation {
            state,
            node,
            partition,
            exit_code: None,
        },
    ))
}

/// Parse one `sacct -P` row: `JobID|State|ExitCode|NodeList`.
///
/// Sub-step rows (`123.batch`, `123.extern`) are skipped; only the
/// allocation row carries the job-level verdict.
pub(crate) fn parse_sacct_line(line: &str) -> Option<(u64, JobObservation)> {
    let mut fields = line.trim().split('|');
    let id_field = fields.next()?.trim();
    if id_field.contains('.') {
        return None;
    }
    let job_id: u64 = id_field.parse().ok()?;
    let state = SchedState::from_slurm(fields.next()?.trim());
    let exit_code = fields.next().and_then(parse_exit_code);
    let node = fields
        .next()
        .and_then(non_empty)
        .filter(|n| n != "None assigned");
    Some((
        job_id,
        JobObservation {
            state,
            node,
            partition: None,
            exit_code,
        },
    ))
}

/// Slurm's `ExitCode` is `exit:signal`; the exit half is what the wrapper
/// contract speaks.
pub(crate) fn parse_exit_code(field: &str) -> Option<i32> {
    field.trim().split(':').next()?.parse().ok()
}

fn non_empty(field: &str) -> Option<String> {
    let trimmed = field.trim();
    if trimmed.is_empty() || trimmed == "(null)" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
#[path = "slurm_tests.rs"]
mod tests;
