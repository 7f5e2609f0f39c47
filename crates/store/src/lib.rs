// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! shepherd-store: the shared-filesystem state model.
//!
//! Supervisor and wrapper cooperate through files alone. This crate owns
//! the directory layout, the atomic-write primitive both sides use, the
//! advisory locks that serialize supervisor mutations, and corruption
//! quarantine so a damaged file can never crash a tick.

pub mod atomic;
pub mod blacklist_store;
pub mod layout;
pub mod lock;
pub mod run_store;

pub use atomic::{write_atomic, write_json_atomic};
pub use blacklist_store::BlacklistStore;
pub use layout::{LayoutError, StateLayout};
pub use lock::{FileLock, PidLock};
pub use run_store::{RunStore, StoreError};
