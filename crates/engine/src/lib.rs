// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gantry-engine: compiles pipelines and drives steps on a pod.
//!
//! The compiler lowers the linted manifest into an immutable [`Spec`]:
//! one pod holding one container slot per step, every slot created
//! up-front with a placeholder image. The engine starts a step by
//! swapping its container image in place, then follows the container
//! through ready, log tail and termination.

pub mod compiler;
pub mod engine;
#[cfg(any(test, feature = "test-support"))]
pub mod fake;
pub mod image;
pub mod livelog;
pub mod runtime;
pub mod spec;

pub use compiler::{Compiler, CompilerArgs};
pub use engine::PodEngine;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{EngineCall, FakeEngine};
pub use runtime::{DestroyError, Engine, EngineError, StepResult};
pub use spec::{ErrPolicy, RunPolicy, SecretVar, Spec, Step, PLACEHOLDER_IMAGE};
