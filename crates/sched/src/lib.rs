// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! shepherd-sched: the batch-scheduler CLI adapter.
//!
//! Wraps Slurm's command-line tools (`sbatch`, `squeue`, `sacct`,
//! `scancel`) behind a client trait with explicit call outcomes — every
//! external invocation runs under a hard timeout and reports ok, timeout,
//! transient, or fatal, so no failure path depends on unwinding.

pub mod call;
pub mod slurm;
pub mod snapshot;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use call::CallOutcome;
pub use slurm::{SchedClient, SlurmClient, SlurmConfig};
pub use snapshot::{JobObservation, SchedSnapshot, SubmitRequest};

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeScheduler;
