// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory file locks.
//!
//! Per-run locks serialize one tick's mutations on a run; the blacklist
//! lock serializes read-modify-write of the global document; the PID lock
//! keeps a second supervisor from starting against the same state root.
//! All locks release on drop (the OS also releases them if the process
//! dies, which is what makes them safe on a shared filesystem).

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// An exclusive advisory lock held on a lockfile.
#[derive(Debug)]
pub struct FileLock {
    // NOTE(lifetime): held to maintain the exclusive lock; released on drop
    #[allow(dead_code)]
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Try to take the lock without blocking.
    ///
    /// Returns `Ok(None)` when another process holds it; the caller skips
    /// this tick for the contended resource and retries next tick.
    pub fn try_exclusive(path: &Path) -> io::Result<Option<FileLock>> {
        let file = open_lockfile(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(FileLock {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Take the lock, blocking until it is free.
    ///
    /// Used only for the blacklist document, whose critical section is a
    /// single small read-modify-write.
    pub fn exclusive(path: &Path) -> io::Result<FileLock> {
        let file = open_lockfile(path)?;
        file.lock_exclusive()?;
        Ok(FileLock {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The daemon's exclusive PID lock (`daemon.pid`).
///
/// The file doubles as the pidfile: the PID is written only after the lock
/// is held, so a stale file from a crashed daemon never blocks startup.
#[derive(Debug)]
pub struct PidLock {
    // NOTE(lifetime): held to maintain the exclusive lock; released on drop
    #[allow(dead_code)]
    file: File,
    path: PathBuf,
}

impl PidLock {
    /// Acquire the lock and record our PID, or fail if a daemon already
    /// holds it.
    pub fn acquire(path: &Path) -> io::Result<PidLock> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Do not truncate before holding the lock: that would wipe the
        // running daemon's PID.
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.try_lock_exclusive()?;
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;
        Ok(PidLock {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Remove the pidfile on clean shutdown. The lock itself releases on
    /// drop either way.
    pub fn release(self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn open_lockfile(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
