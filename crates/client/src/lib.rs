// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gantry-client: the remote control plane and credential providers.
//!
//! The runner never persists anything locally; stages, steps and logs
//! all flow through the [`Client`] trait. Secret and registry
//! providers resolve credentials referenced by the pipeline.

pub mod client;
#[cfg(any(test, feature = "test-support"))]
pub mod fake;
pub mod http;
pub mod registry;
pub mod secret;

pub use client::{Client, ClientError, Line, StageContext};
#[cfg(any(test, feature = "test-support"))]
pub use fake::{ClientCall, FakeClient};
pub use http::HttpClient;
