// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The heartbeat emitter.
//!
//! A background task atomically overwrites the run's heartbeat file on a
//! fixed cadence while the workload runs, and stops promptly on workload
//! exit via a watch channel. The file is the only shared state: single
//! writer, atomic replacement, readers never see a torn value.

use shepherd_core::{Clock, Heartbeat, RunId, SystemClock};
use shepherd_store::RunStore;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

pub struct HeartbeatTask {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Start heartbeating. The first beat is written immediately so the
/// supervisor sees liveness as soon as the wrapper is up.
pub fn spawn(store: RunStore, run_id: RunId, interval_sec: u64) -> HeartbeatTask {
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_sec.max(1)));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let beat = Heartbeat(SystemClock.epoch_secs());
                    if let Err(e) = store.write_heartbeat(&run_id, beat) {
                        // Transient shared-fs hiccups show up as a late
                        // heartbeat, not a dead wrapper; keep beating.
                        warn!(%run_id, error = %e, "heartbeat write failed");
                    }
                }
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
    });
    HeartbeatTask { stop_tx, handle }
}

impl HeartbeatTask {
    /// Stop the emitter and wait for it to finish its last write.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
