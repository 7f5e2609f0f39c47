// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic file replacement.
//!
//! Every state file update follows the same discipline:
//!
//! 1. Write to `name.tmp.<pid>.<nanos>` in the target directory
//! 2. Fsync the temp file (data durable)
//! 3. Rename over `name` (atomic replacement)
//! 4. Fsync the directory, best-effort (rename durable)
//!
//! Readers either see the old content or the new content, never a torn
//! write. The pid+nanos suffix keeps concurrent writers (supervisor tick
//! vs. wrapper heartbeat on a shared filesystem) from clobbering each
//! other's temp files.

use serde::Serialize;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds since the epoch, for unique temp/quarantine suffixes.
pub(crate) fn epoch_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}

/// Atomically replace `path` with `bytes`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::other("atomic write target has no parent directory"))?;
    std::fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::other("atomic write target has no file name"))?;
    let tmp = parent.join(format!(
        "{file_name}.tmp.{}.{}",
        std::process::id(),
        epoch_nanos()
    ));

    let mut file = File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }

    // Make the rename durable; failure here loses durability, not atomicity.
    if let Ok(dir) = File::open(parent) {
        let _ = dir.sync_all();
    }

    Ok(())
}

/// Atomically replace `path` with the JSON encoding of `value`,
/// newline-terminated.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let mut bytes = serde_json::to_vec(value).map_err(io::Error::other)?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}

#[cfg(test)]
#[path = "atomic_tests.rs"]
mod tests;
