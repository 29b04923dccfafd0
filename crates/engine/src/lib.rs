// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! stepwise-engine: drives durable workflows step by step

mod error;
mod machine;
mod stepper;

#[cfg(test)]
mod test_support;

pub use error::EngineError;
pub use machine::{Created, StateMachine};
pub use stepper::Advanced;
