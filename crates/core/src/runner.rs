// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner contract: the user-supplied definition of one workflow kind

use crate::state::{CreateOptions, Initial, Workflow};
use crate::step::{StepRegistrationParams, StepRegistry};
use async_trait::async_trait;

/// Boxed error returned by user code
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait]
pub trait Runner: Send + Sync + 'static {
    type Workflow: Workflow;
    type CreateOptions: CreateOptions;

    /// Workflow-kind tag stamped on every instance this runner creates
    fn workflow_type(&self) -> &str;

    /// First step and initial payloads for a new instance
    async fn create(
        &self,
        options: &Self::CreateOptions,
    ) -> Result<Initial<Self::Workflow>, BoxError>;

    /// Step table, built once per advance
    fn steps(&self, params: &StepRegistrationParams) -> StepRegistry<Self::Workflow>;
}
