// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow instance state
//!
//! A [`State`] is the typed, in-memory view of one persisted instance. The
//! payload types and the step tag type are fixed per workflow kind through
//! the [`Workflow`] trait; storage only ever sees the opaque form produced by
//! [`crate::codec`].

use crate::id::StateId;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Lifecycle status of a workflow instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Created, no step has advanced it yet
    New,
    /// At least one transition happened
    InProgress,
    /// Terminal: finished successfully
    Completed,
    /// Terminal: finished unsuccessfully
    Failed,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    ///
    /// Staying put is allowed for non-terminal statuses. A terminal status
    /// accepts nothing.
    pub fn can_transition_to(self, next: Status) -> bool {
        match (self, next) {
            (Status::New, _) => true,
            (Status::InProgress, Status::New) => false,
            (Status::InProgress, _) => true,
            (Status::Completed | Status::Failed, _) => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::New => "new",
            Status::InProgress => "in_progress",
            Status::Completed => "completed",
            Status::Failed => "failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounds every serialized payload (Data, FailData, MetaData) must satisfy.
///
/// `Default` provides the value a zero-length stored payload decodes to.
pub trait Payload:
    Serialize + DeserializeOwned + Default + Clone + fmt::Debug + Send + Sync + 'static
{
}

impl<T> Payload for T where
    T: Serialize + DeserializeOwned + Default + Clone + fmt::Debug + Send + Sync + 'static
{
}

/// Tag naming one step of a workflow
pub trait StepTag: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Stable string form written to storage
    fn as_str(&self) -> &str;

    /// Parse the stored form back; `None` marks an unrecognized tag
    fn parse(tag: &str) -> Option<Self>;
}

impl StepTag for String {
    fn as_str(&self) -> &str {
        self
    }

    fn parse(tag: &str) -> Option<Self> {
        Some(tag.to_string())
    }
}

/// Type bundle describing one workflow kind
pub trait Workflow: Send + Sync + 'static {
    type Data: Payload;
    type FailData: Payload;
    type MetaData: Payload;
    type Step: StepTag;
}

/// Options passed to `create`; the idempotency key collapses repeated requests
pub trait CreateOptions: Send + Sync {
    fn idempotency_key(&self) -> &str;
}

/// One workflow instance
pub struct State<W: Workflow> {
    pub id: StateId,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    /// Last time Status or Step changed
    pub updated_at: DateTime<Utc>,
    pub status: Status,
    /// Current step; `None` once the instance is terminal
    pub step: Option<W::Step>,
    pub workflow_type: String,
    pub data: W::Data,
    pub fail_data: W::FailData,
    pub meta_data: W::MetaData,
    /// Business error returned by the most recent step invocation
    pub error: Option<String>,
}

impl<W: Workflow> State<W> {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Stored form of the current step; empty when terminal
    pub fn step_tag(&self) -> &str {
        self.step.as_ref().map(|step| step.as_str()).unwrap_or("")
    }
}

impl<W: Workflow> Clone for State<W> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            idempotency_key: self.idempotency_key.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            status: self.status,
            step: self.step.clone(),
            workflow_type: self.workflow_type.clone(),
            data: self.data.clone(),
            fail_data: self.fail_data.clone(),
            meta_data: self.meta_data.clone(),
            error: self.error.clone(),
        }
    }
}

impl<W: Workflow> fmt::Debug for State<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("id", &self.id)
            .field("idempotency_key", &self.idempotency_key)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("status", &self.status)
            .field("step", &self.step)
            .field("workflow_type", &self.workflow_type)
            .field("data", &self.data)
            .field("fail_data", &self.fail_data)
            .field("meta_data", &self.meta_data)
            .field("error", &self.error)
            .finish()
    }
}

impl<W: Workflow> PartialEq for State<W>
where
    W::Data: PartialEq,
    W::FailData: PartialEq,
    W::MetaData: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.idempotency_key == other.idempotency_key
            && self.created_at == other.created_at
            && self.updated_at == other.updated_at
            && self.status == other.status
            && self.step == other.step
            && self.workflow_type == other.workflow_type
            && self.data == other.data
            && self.fail_data == other.fail_data
            && self.meta_data == other.meta_data
            && self.error == other.error
    }
}

/// Initial values a runner returns from `create`
pub struct Initial<W: Workflow> {
    pub first_step: W::Step,
    pub data: W::Data,
    pub meta_data: W::MetaData,
}

impl<W: Workflow> Initial<W> {
    pub fn new(first_step: W::Step, data: W::Data) -> Self {
        Self {
            first_step,
            data,
            meta_data: W::MetaData::default(),
        }
    }

    pub fn with_meta_data(mut self, meta_data: W::MetaData) -> Self {
        self.meta_data = meta_data;
        self
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
