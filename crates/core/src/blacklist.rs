// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TTL-bounded node blacklist.
//!
//! A user-local circuit breaker: nodes that produced hardware-class
//! failures are excluded from future submissions until their entry
//! expires. Persisted as a single JSON document mapping node name to
//! entry (`blacklist.json`).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One blacklisted node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub reason: String,
    /// Epoch seconds of the most recent strike.
    pub added_at: u64,
    pub ttl_sec: u64,
    /// How many times this node has been blacklisted since its entry was
    /// last allowed to expire.
    pub strikes: u32,
}

impl BlacklistEntry {
    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.added_at) > self.ttl_sec
    }
}

/// The whole blacklist document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Blacklist {
    nodes: IndexMap<String, BlacklistEntry>,
}

impl Blacklist {
    /// Add a strike against `node`, refreshing `added_at` and keeping the
    /// longer of the old and new TTLs for repeat offenders.
    pub fn insert(&mut self, node: impl Into<String>, reason: impl Into<String>, ttl_sec: u64, now: u64) {
        let node = node.into();
        let reason = reason.into();
        match self.nodes.get_mut(&node) {
            Some(entry) if !entry.is_expired(now) => {
                entry.strikes += 1;
                entry.added_at = now;
                entry.ttl_sec = entry.ttl_sec.max(ttl_sec);
                entry.reason = reason;
            }
            _ => {
                self.nodes.insert(
                    node,
                    BlacklistEntry {
                        reason,
                        added_at: now,
                        ttl_sec,
                        strikes: 1,
                    },
                );
            }
        }
    }

    /// Remove a node unconditionally. Returns whether it was present.
    pub fn remove(&mut self, node: &str) -> bool {
        self.nodes.shift_remove(node).is_some()
    }

    /// Drop every expired entry.
    pub fn prune_expired(&mut self, now: u64) {
        self.nodes.retain(|_, entry| !entry.is_expired(now));
    }

    /// Nodes to pass as `--exclude`: unexpired entries, most recently
    /// struck first, capped at `limit`.
    pub fn exclude_list(&self, now: u64, limit: usize) -> Vec<String> {
        let mut live: Vec<(&String, &BlacklistEntry)> = self
            .nodes
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .collect();
        live.sort_by(|a, b| b.1.added_at.cmp(&a.1.added_at));
        live.into_iter()
            .take(limit)
            .map(|(node, _)| node.clone())
            .collect()
    }

    pub fn contains_active(&self, node: &str, now: u64) -> bool {
        self.nodes
            .get(node)
            .map(|entry| !entry.is_expired(now))
            .unwrap_or(false)
    }

    pub fn get(&self, node: &str) -> Option<&BlacklistEntry> {
        self.nodes.get(node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BlacklistEntry)> {
        self.nodes.iter()
    }
}

#[cfg(test)]
#[path = "blacklist_tests.rs"]
mod tests;
