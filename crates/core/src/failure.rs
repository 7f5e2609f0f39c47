// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured failure reporting between wrapper and supervisor.
//!
//! The wrapper communicates the nature of a crash two ways at once: its
//! process exit code (visible to the scheduler) and `failure.json` (visible
//! to the supervisor). The exit-code contract is what the supervisor keys
//! restart and blacklist decisions off.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Preflight found no usable GPU, or the visible device count is wrong.
pub const EXIT_NODE_FAULT: i32 = 42;
/// Foreign processes were seen on the allocation's GPUs.
pub const EXIT_TRESPASSER: i32 = 43;
/// The CUDA smoke test failed at runtime.
pub const EXIT_CUDA_FAILURE: i32 = 44;
/// The workload itself failed; the node is not suspect.
pub const EXIT_WORKLOAD_FAILURE: i32 = 50;

/// Classified cause of a nonzero wrapper exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NodeFault,
    Trespasser,
    CudaFailure,
    WorkloadFailure,
    Unknown,
}

impl FailureKind {
    /// Map a wrapper exit code to its failure class.
    ///
    /// Codes outside the contract classify as `Unknown` and are handled
    /// like workload failures (backoff, never blacklist).
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            EXIT_NODE_FAULT => FailureKind::NodeFault,
            EXIT_TRESPASSER => FailureKind::Trespasser,
            EXIT_CUDA_FAILURE => FailureKind::CudaFailure,
            EXIT_WORKLOAD_FAILURE => FailureKind::WorkloadFailure,
            _ => FailureKind::Unknown,
        }
    }

    /// Whether this failure class implicates the node (and so may
    /// blacklist it).
    pub fn blacklists(self) -> bool {
        matches!(
            self,
            FailureKind::NodeFault | FailureKind::CudaFailure | FailureKind::Trespasser
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::NodeFault => "node_fault",
            FailureKind::Trespasser => "trespasser",
            FailureKind::CudaFailure => "cuda_failure",
            FailureKind::WorkloadFailure => "workload_failure",
            FailureKind::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Written by the wrapper as `failure.json` on any nonzero exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub exit_code: i32,
    pub kind: FailureKind,
    /// Hostname of the compute node the wrapper ran on.
    pub node: String,
    #[serde(default)]
    pub job_id: Option<u64>,
    /// Epoch seconds when the failure was recorded.
    pub timestamp: u64,
    pub detail: String,
}

#[cfg(test)]
#[path = "failure_tests.rs"]
mod tests;
