// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow instance identifiers and their generators

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier of one workflow instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(pub String);

impl StateId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for StateId {
    fn from(s: String) -> Self {
        StateId(s)
    }
}

impl From<&str> for StateId {
    fn from(s: &str) -> Self {
        StateId(s.to_string())
    }
}

/// Generates identifiers for newly created instances
pub trait IdGen: Clone + Send + Sync + 'static {
    fn next(&self) -> StateId;
}

/// UUID-based generator for production use
#[derive(Clone, Debug, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> StateId {
        StateId(uuid::Uuid::new_v4().to_string())
    }
}

/// Sequential generator for deterministic tests
///
/// Clones share the counter, so a generator handed to a state machine can
/// still be inspected by the test that built it.
#[derive(Clone, Debug)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Number of identifiers handed out so far
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::SeqCst) - 1
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("state")
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> StateId {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        StateId(format!("{}-{}", self.prefix, n))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
