// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System errors returned by the state machine
//!
//! Business failures raised by a step are not here: they travel as
//! [`stepwise_core::StepError`] in [`crate::Advanced::step_error`].

use stepwise_core::{BoxError, CodecError, StateId, Status, StorageError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("state not found: {0}")]
    NotFound(StateId),
    #[error("state already exists for idempotency key {0}")]
    AlreadyExists(String),
    #[error("state {id} is in terminal status {status}")]
    InTerminalStatus { id: StateId, status: Status },
    #[error("options supplied but step {step} declares no options type")]
    OptionsIsUndefined { step: String },
    #[error("unknown step: {0}")]
    UnknownStep(String),
    #[error("step registered twice: {0}")]
    DuplicateStep(String),
    #[error("no-op transition: step {0} returned itself as next step")]
    NoOpTransition(String),
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: Status, to: Status },
    #[error("runner create failed: {0}")]
    Create(#[source] BoxError),
    #[error("storage error during {op}: {source}")]
    Storage {
        op: &'static str,
        #[source]
        source: StorageError,
    },
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl EngineError {
    pub(crate) fn storage(op: &'static str) -> impl FnOnce(StorageError) -> Self {
        move |source| EngineError::Storage { op, source }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, EngineError::AlreadyExists(_))
    }
}
