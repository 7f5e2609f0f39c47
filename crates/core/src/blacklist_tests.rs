// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn insert_then_expire() {
    let mut bl = Blacklist::default();
    bl.insert("nodeA", "gpu fault", 100, 1_000);
    assert!(bl.contains_active("nodeA", 1_100));
    // Strict >: exactly at TTL the entry is still active.
    assert!(bl.contains_active("nodeA", 1_100));
    assert!(!bl.contains_active("nodeA", 1_101));
}

#[test]
fn repeat_strikes_refresh_and_keep_longer_ttl() {
    let mut bl = Blacklist::default();
    bl.insert("nodeA", "gpu fault", 3_600, 1_000);
    bl.insert("nodeA", "trespasser", 600, 2_000);
    let entry = bl.get("nodeA").unwrap();
    assert_eq!(entry.strikes, 2);
    assert_eq!(entry.added_at, 2_000);
    assert_eq!(entry.ttl_sec, 3_600);
    assert_eq!(entry.reason, "trespasser");
}

#[test]
fn strike_count_resets_after_expiry() {
    let mut bl = Blacklist::default();
    bl.insert("nodeA", "gpu fault", 100, 1_000);
    // Entry expired long before the second strike.
    bl.insert("nodeA", "gpu fault", 100, 9_000);
    assert_eq!(bl.get("nodeA").unwrap().strikes, 1);
}

#[test]
fn exclude_list_orders_by_recency_and_caps() {
    let mut bl = Blacklist::default();
    bl.insert("old", "fault", 10_000, 1_000);
    bl.insert("mid", "fault", 10_000, 2_000);
    bl.insert("new", "fault", 10_000, 3_000);
    assert_eq!(bl.exclude_list(4_000, 8), ["new", "mid", "old"]);
    assert_eq!(bl.exclude_list(4_000, 2), ["new", "mid"]);
}

#[test]
fn exclude_list_skips_expired_entries() {
    let mut bl = Blacklist::default();
    bl.insert("stale", "fault", 10, 1_000);
    bl.insert("live", "fault", 10_000, 1_000);
    assert_eq!(bl.exclude_list(5_000, 8), ["live"]);
}

#[test]
fn prune_drops_only_expired() {
    let mut bl = Blacklist::default();
    bl.insert("a", "fault", 10, 1_000);
    bl.insert("b", "fault", 10_000, 1_000);
    bl.prune_expired(5_000);
    assert_eq!(bl.len(), 1);
    assert!(bl.get("b").is_some());
}

#[test]
fn document_round_trips_as_a_bare_map() {
    let mut bl = Blacklist::default();
    bl.insert("nodeA", "gpu fault", 100, 1_000);
    let json = serde_json::to_string(&bl).unwrap();
    // Transparent serialization: the document IS the node map.
    assert!(json.starts_with("{\"nodeA\":"));
    let back: Blacklist = serde_json::from_str(&json).unwrap();
    assert_eq!(back, bl);
}
