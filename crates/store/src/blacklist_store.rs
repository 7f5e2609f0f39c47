// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The global blacklist document.
//!
//! A single JSON file, mutated read-modify-write under a global lockfile
//! so concurrent ticks (or a CLI `blacklist add`) never lose updates.
//! Expired entries are pruned on every write. Reads are lock-free; a
//! reader that races a writer sees the old or the new document, never a
//! torn one, thanks to the atomic-write primitive.

use crate::atomic::write_json_atomic;
use crate::layout::StateLayout;
use crate::lock::FileLock;
use crate::run_store::StoreError;
use shepherd_core::Blacklist;
use std::io;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct BlacklistStore {
    layout: StateLayout,
}

impl BlacklistStore {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    /// Lock-free read. Missing or corrupt documents read as empty; a
    /// corrupt document will be replaced wholesale on the next write.
    pub fn load(&self) -> Result<Blacklist, StoreError> {
        let path = self.layout.blacklist_path();
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Blacklist::default()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(bl) => Ok(bl),
            Err(e) => {
                warn!(error = %e, "blacklist.json is corrupt, treating as empty");
                Ok(Blacklist::default())
            }
        }
    }

    /// Read-modify-write under the global lock. `mutate` sees the current
    /// document; expired entries are pruned before the result is written
    /// back. Returns the document as written.
    pub fn update<F>(&self, now: u64, mutate: F) -> Result<Blacklist, StoreError>
    where
        F: FnOnce(&mut Blacklist),
    {
        let _lock = FileLock::exclusive(&self.layout.blacklist_lock_path())?;
        let mut blacklist = self.load()?;
        mutate(&mut blacklist);
        blacklist.prune_expired(now);
        write_json_atomic(&self.layout.blacklist_path(), &blacklist)?;
        Ok(blacklist)
    }

    /// Current exclude list for a submission: unexpired nodes, most recent
    /// first, capped at `limit`.
    pub fn exclude_list(&self, now: u64, limit: usize) -> Result<Vec<String>, StoreError> {
        Ok(self.load()?.exclude_list(now, limit))
    }
}

#[cfg(test)]
#[path = "blacklist_store_tests.rs"]
mod tests;
