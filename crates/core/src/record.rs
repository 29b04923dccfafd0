// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted row shapes
//!
//! Storage backends only ever see these untyped records. Payload columns hold
//! the opaque bytes produced by [`crate::codec`]; a zero-length payload means
//! "no value".

use crate::id::StateId;
use crate::state::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One workflow instance as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    pub id: StateId,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: Status,
    /// Current step tag, empty when terminal
    pub step: String,
    pub workflow_type: String,
    #[serde(default)]
    pub data: Vec<u8>,
    #[serde(default)]
    pub fail_data: Vec<u8>,
    #[serde(default)]
    pub meta_data: Vec<u8>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Mutable columns written at the end of every step iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub updated_at: DateTime<Utc>,
    pub status: Status,
    pub step: String,
    #[serde(default)]
    pub data: Vec<u8>,
    #[serde(default)]
    pub fail_data: Vec<u8>,
    #[serde(default)]
    pub meta_data: Vec<u8>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StateRecord {
    /// Overwrite the mutable columns, returning the previous values
    pub fn apply(&mut self, update: StateUpdate) -> StateUpdate {
        let previous = self.to_update();
        self.updated_at = update.updated_at;
        self.status = update.status;
        self.step = update.step;
        self.data = update.data;
        self.fail_data = update.fail_data;
        self.meta_data = update.meta_data;
        self.error = update.error;
        previous
    }

    pub fn to_update(&self) -> StateUpdate {
        StateUpdate {
            updated_at: self.updated_at,
            status: self.status,
            step: self.step.clone(),
            data: self.data.clone(),
            fail_data: self.fail_data.clone(),
            meta_data: self.meta_data.clone(),
            error: self.error.clone(),
        }
    }
}

/// Append-only audit row for one step invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepExecution {
    pub state_id: StateId,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Business error returned by the step, if any
    #[serde(default)]
    pub error: Option<String>,
    /// Step that ran
    pub preview_step: String,
    /// Transition target; absent when the step did not move
    #[serde(default)]
    pub next_step: Option<String>,
}
