// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mapping between typed state and stored records
//!
//! Payloads are JSON. A value whose JSON form is `null` is stored as a
//! zero-length payload, and a zero-length payload reads back as the type's
//! `Default`.

use crate::record::{StateRecord, StateUpdate};
use crate::state::{State, StepTag, Workflow};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

const NULL: &[u8] = b"null";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode {field}: {source}")]
    Encode {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode {field}: {source}")]
    Decode {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown step tag: {0}")]
    UnknownStep(String),
}

/// Encode one payload column
pub fn encode<T: Serialize>(field: &'static str, value: &T) -> Result<Vec<u8>, CodecError> {
    let bytes =
        serde_json::to_vec(value).map_err(|source| CodecError::Encode { field, source })?;
    if bytes == NULL {
        return Ok(Vec::new());
    }
    Ok(bytes)
}

/// Decode one payload column
pub fn decode<T: DeserializeOwned + Default>(
    field: &'static str,
    bytes: &[u8],
) -> Result<T, CodecError> {
    if bytes.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes).map_err(|source| CodecError::Decode { field, source })
}

/// Full record for a freshly created instance
pub fn encode_state<W: Workflow>(state: &State<W>) -> Result<StateRecord, CodecError> {
    Ok(StateRecord {
        id: state.id.clone(),
        idempotency_key: state.idempotency_key.clone(),
        created_at: state.created_at,
        updated_at: state.updated_at,
        status: state.status,
        step: state.step_tag().to_string(),
        workflow_type: state.workflow_type.clone(),
        data: encode("data", &state.data)?,
        fail_data: encode("fail_data", &state.fail_data)?,
        meta_data: encode("meta_data", &state.meta_data)?,
        error: state.error.clone(),
    })
}

/// Mutable columns of `state`, as written after each step
pub fn state_update<W: Workflow>(state: &State<W>) -> Result<StateUpdate, CodecError> {
    Ok(StateUpdate {
        updated_at: state.updated_at,
        status: state.status,
        step: state.step_tag().to_string(),
        data: encode("data", &state.data)?,
        fail_data: encode("fail_data", &state.fail_data)?,
        meta_data: encode("meta_data", &state.meta_data)?,
        error: state.error.clone(),
    })
}

/// Typed view of a stored record. An empty step tag decodes to `None`.
pub fn decode_state<W: Workflow>(record: StateRecord) -> Result<State<W>, CodecError> {
    let step = if record.step.is_empty() {
        None
    } else {
        let step = W::Step::parse(&record.step).ok_or(CodecError::UnknownStep(record.step))?;
        Some(step)
    };

    Ok(State {
        data: decode("data", &record.data)?,
        fail_data: decode("fail_data", &record.fail_data)?,
        meta_data: decode("meta_data", &record.meta_data)?,
        id: record.id,
        idempotency_key: record.idempotency_key,
        created_at: record.created_at,
        updated_at: record.updated_at,
        status: record.status,
        step,
        workflow_type: record.workflow_type,
        error: record.error,
    })
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
