// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Completion options: caller-supplied data that resumes a waiting step
//!
//! Options travel as a tagged value: an explicit `kind` discriminator plus a
//! JSON payload. A step declares the shape it accepts with
//! [`OptionsShape::of`], and reads the options back with
//! [`crate::StepContext::options`], which checks the discriminator before
//! decoding.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A type that can be supplied as completion options
pub trait StepOptions: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Discriminator carried alongside the payload
    const KIND: &'static str;
}

/// Errors from building or reading completion options
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("options supplied but the step declares no options type")]
    Undeclared,
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
    #[error("cannot assign {declared} to {destination}")]
    NotAssignable {
        declared: &'static str,
        destination: &'static str,
    },
    #[error("invalid options payload for {kind}: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Tagged completion options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    kind: String,
    payload: serde_json::Value,
}

impl CompletionOptions {
    /// Wrap a typed options value
    pub fn new<T: StepOptions>(options: &T) -> Result<Self, OptionsError> {
        let payload = serde_json::to_value(options).map_err(|source| OptionsError::Payload {
            kind: T::KIND.to_string(),
            source,
        })?;
        Ok(Self {
            kind: T::KIND.to_string(),
            payload,
        })
    }

    /// Build from an already-serialized payload, e.g. one received over the wire
    pub fn from_parts(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }
}

/// Expected options shape declared by a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionsShape {
    kind: &'static str,
    type_name: &'static str,
}

impl OptionsShape {
    pub fn of<T: StepOptions>() -> Self {
        Self {
            kind: T::KIND,
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Validate `supplied` against `shape` and decode it into `T`.
///
/// | shape | supplied | result |
/// |---|---|---|
/// | none | none | `Ok(None)` |
/// | some | none | `Ok(None)` |
/// | none | some | `Err(Undeclared)` |
/// | some | other kind | `Err(TypeMismatch)` |
/// | some | same kind, `T` is not the declared type | `Err(NotAssignable)` |
/// | some | same kind | `Ok(Some(value))` |
pub fn read_options<T: StepOptions>(
    shape: Option<&OptionsShape>,
    supplied: Option<&CompletionOptions>,
) -> Result<Option<T>, OptionsError> {
    let (shape, supplied) = match (shape, supplied) {
        (None, None) | (Some(_), None) => return Ok(None),
        (None, Some(_)) => return Err(OptionsError::Undeclared),
        (Some(shape), Some(supplied)) => (shape, supplied),
    };

    if supplied.kind != shape.kind {
        return Err(OptionsError::TypeMismatch {
            expected: shape.kind.to_string(),
            actual: supplied.kind.clone(),
        });
    }

    if T::KIND != shape.kind {
        return Err(OptionsError::NotAssignable {
            declared: shape.type_name,
            destination: std::any::type_name::<T>(),
        });
    }

    serde_json::from_value(supplied.payload.clone())
        .map(Some)
        .map_err(|source| OptionsError::Payload {
            kind: supplied.kind.clone(),
            source,
        })
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;
