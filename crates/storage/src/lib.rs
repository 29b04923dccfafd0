// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! stepwise-storage: reference backends for the storage contract
//!
//! - [`MemoryStorage`]: in-process tables with failure injection
//! - [`WalStorage`]: durable write-ahead log with replay
//! - [`TracedStorage`]: tracing wrapper for any backend

mod entry;
mod memory;
mod state;
mod traced;
mod wal;

#[cfg(test)]
mod test_support;

pub use entry::WalEntry;
pub use memory::{FailPoint, MemoryStorage};
pub use state::{MaterializedState, Undo, UndoLog};
pub use traced::TracedStorage;
pub use wal::{Replay, WalStorage, WalStorageConfig};
