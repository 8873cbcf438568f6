// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work acquisition loop.
//!
//! Each poller routine requests staged work from the control plane
//! and executes it to completion before asking again. Transient
//! request failures back off instead of spinning.

use crate::runner::Runner;
use gantry_client::Client;
use gantry_core::Clock;
use gantry_engine::Engine;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Pause after an empty queue response or a request error.
const POLL_PAUSE: Duration = Duration::from_secs(1);

/// Polls the control plane for staged work.
pub struct Poller<C: Client, E: Engine, K: Clock> {
    pub runner: Arc<Runner<C, E, K>>,
    pub os: String,
    pub arch: String,
}

impl<C: Client, E: Engine, K: Clock> Poller<C, E, K> {
    /// Run the poll loop until cancelled. Spawn this once per unit of
    /// runner capacity.
    pub async fn poll(&self, cancel: CancellationToken) {
        loop {
            let request = tokio::select! {
                _ = cancel.cancelled() => return,
                request = self.runner.client.request(&self.os, &self.arch) => request,
            };
            match request {
                Ok(Some(stage)) => {
                    if let Err(err) = self.runner.run(stage).await {
                        tracing::error!(error = %err, "cannot run stage");
                    }
                }
                Ok(None) => {
                    tokio::time::sleep(POLL_PAUSE).await;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "cannot request stage");
                    tokio::time::sleep(POLL_PAUSE).await;
                }
            }
        }
    }
}
