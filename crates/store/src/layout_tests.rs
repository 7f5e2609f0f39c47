// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn path_schema_matches_the_contract() {
    let layout = StateLayout::new("/tmp/shep");
    let id = RunId::new("train-7b");

    assert_eq!(layout.run_dir(&id), Path::new("/tmp/shep/runs/train-7b"));
    assert_eq!(
        layout.meta_path(&id),
        Path::new("/tmp/shep/runs/train-7b/meta.json")
    );
    assert_eq!(
        layout.heartbeat_path(&id),
        Path::new("/tmp/shep/runs/train-7b/heartbeat")
    );
    assert_eq!(
        layout.badnode_log_path(&id),
        Path::new("/tmp/shep/runs/train-7b/badnode_events.log")
    );
    assert_eq!(
        layout.run_lock_path(&id),
        Path::new("/tmp/shep/locks/train-7b.lock")
    );
    assert_eq!(
        layout.blacklist_path(),
        Path::new("/tmp/shep/blacklist.json")
    );
    assert_eq!(layout.daemon_pid_path(), Path::new("/tmp/shep/daemon.pid"));
}

#[test]
fn ensure_dirs_creates_runs_and_locks() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StateLayout::new(dir.path());
    layout.ensure_dirs().unwrap();
    assert!(layout.runs_dir().is_dir());
    assert!(layout.locks_dir().is_dir());
}
