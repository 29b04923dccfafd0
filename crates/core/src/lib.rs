// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! stepwise-core: data model and contracts for durable workflows
//!
//! This crate provides:
//! - The typed workflow instance ([`State`]) and its lifecycle ([`Status`])
//! - The five-outcome step protocol and the step registry
//! - Tagged completion options used to resume a waiting step
//! - The mapping between typed state and opaque stored records
//! - The [`Storage`] and [`Runner`] contracts the engine drives
//! - Injectable [`Clock`] and [`IdGen`]

pub mod clock;
pub mod codec;
pub mod config;
pub mod id;
pub mod options;
pub mod record;
pub mod runner;
pub mod state;
pub mod step;
pub mod storage;

pub use clock::{Clock, FakeClock, SystemClock};
pub use codec::CodecError;
pub use config::{ConfigError, EngineConfig};
pub use id::{IdGen, SequentialIdGen, StateId, UuidIdGen};
pub use options::{CompletionOptions, OptionsError, OptionsShape, StepOptions};
pub use record::{StateRecord, StateUpdate, StepExecution};
pub use runner::{BoxError, Runner};
pub use state::{CreateOptions, Initial, Payload, State, Status, StepTag, Workflow};
pub use step::{
    StepContext, StepDefinition, StepError, StepHandler, StepOutcome, StepRegistrationParams,
    StepRegistry, StepResult,
};
pub use storage::{Operation, Storage, StorageError, Transaction};
