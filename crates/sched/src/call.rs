// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Explicit outcomes for external scheduler calls.

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Result of one scheduler CLI invocation.
///
/// Deliberately not a `Result`: the supervisor dispatches on every variant
/// explicitly, and none of them unwinds. A `Timeout` or `Transient` call
/// reads as scheduler state UNKNOWN and never, by itself, fails a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome<T> {
    Ok(T),
    /// The hard wall-clock timeout elapsed; the child was killed.
    Timeout,
    /// The call ran but failed in a way worth retrying next tick
    /// (nonzero exit, unparseable output, I/O hiccup).
    Transient(String),
    /// The call can never succeed as configured (e.g. binary not found).
    Fatal(String),
}

impl<T> CallOutcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            CallOutcome::Ok(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, CallOutcome::Ok(_))
    }

    /// Map the success value, preserving failure variants.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CallOutcome<U> {
        match self {
            CallOutcome::Ok(value) => CallOutcome::Ok(f(value)),
            CallOutcome::Timeout => CallOutcome::Timeout,
            CallOutcome::Transient(msg) => CallOutcome::Transient(msg),
            CallOutcome::Fatal(msg) => CallOutcome::Fatal(msg),
        }
    }
}

/// Run a subprocess under a hard timeout.
///
/// Timeout expiry kills the child (via the tokio `Child` drop) and maps to
/// `CallOutcome::Timeout`. A missing binary is `Fatal`; other spawn errors
/// are `Transient`.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> CallOutcome<Output> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => CallOutcome::Ok(output),
        Ok(Err(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
            CallOutcome::Fatal(format!("{description}: command not found"))
        }
        Ok(Err(io_err)) => CallOutcome::Transient(format!("{description} failed: {io_err}")),
        Err(_elapsed) => {
            tracing::warn!(
                call = description,
                timeout_sec = timeout.as_secs(),
                "scheduler call timed out"
            );
            CallOutcome::Timeout
        }
    }
}

#[cfg(test)]
#[path = "call_tests.rs"]
mod tests;
