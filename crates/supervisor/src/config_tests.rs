// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn layout_with_config(toml: Option<&str>) -> (tempfile::TempDir, StateLayout) {
    let dir = tempfile::tempdir().unwrap();
    let layout = StateLayout::new(dir.path());
    layout.ensure_dirs().unwrap();
    if let Some(text) = toml {
        std::fs::write(layout.config_path(), text).unwrap();
    }
    (dir, layout)
}

#[test]
fn missing_file_yields_defaults() {
    let (_dir, layout) = layout_with_config(None);
    let config = SupervisorConfig::load(&layout);
    assert_eq!(config.tick_period, Duration::from_secs(5));
    assert_eq!(config.worker_pool, 8);
    assert_eq!(config.call_timeout, Duration::from_secs(15));
    assert_eq!(config.unknown_after_sec, 50);
    assert_eq!(config.cancel_unknown_streak, 3);
}

#[test]
fn file_overrides_merge_over_defaults() {
    let (_dir, layout) = layout_with_config(Some(
        "tick_period_sec = 2\nworker_pool = 4\nblacklist_ttl_trespass_sec = 600\n",
    ));
    let config = SupervisorConfig::load(&layout);
    assert_eq!(config.tick_period, Duration::from_secs(2));
    assert_eq!(config.worker_pool, 4);
    assert_eq!(config.blacklist_ttl_trespass_sec, 600);
    // Unset fields keep their defaults.
    assert_eq!(config.call_timeout, Duration::from_secs(15));
}

#[test]
fn unknown_window_follows_a_custom_tick_period() {
    let (_dir, layout) = layout_with_config(Some("tick_period_sec = 2\n"));
    let config = SupervisorConfig::load(&layout);
    assert_eq!(config.unknown_after_sec, 20);
}

#[test]
fn malformed_file_falls_back_to_defaults() {
    let (_dir, layout) = layout_with_config(Some("tick_period_sec = \"soon\"\n"));
    let config = SupervisorConfig::load(&layout);
    assert_eq!(config.tick_period, Duration::from_secs(5));
}

#[test]
fn zero_workers_is_clamped_to_one() {
    let (_dir, layout) = layout_with_config(Some("worker_pool = 0\n"));
    assert_eq!(SupervisorConfig::load(&layout).worker_pool, 1);
}

#[test]
fn log_rotation_defaults() {
    let (_dir, layout) = layout_with_config(None);
    let config = SupervisorConfig::load(&layout);
    assert_eq!(config.log_rotate_bytes, 10 * 1024 * 1024);
    assert_eq!(config.log_keep_files, 3);
}

#[test]
fn log_rotation_overrides() {
    let (_dir, layout) = layout_with_config(Some(
        "log_rotate_bytes = 1048576\nlog_keep_files = 1\n",
    ));
    let config = SupervisorConfig::load(&layout);
    assert_eq!(config.log_rotate_bytes, 1_048_576);
    assert_eq!(config.log_keep_files, 1);
}
