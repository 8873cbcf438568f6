// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Best-effort reporting to the control plane.
//!
//! Reporting failures never fail the build: they are logged and the
//! stage keeps executing. Server copies are absorbed back into the
//! state so later updates carry fresh versions and ids.

use crate::state::State;
use gantry_client::Client;

/// Push one step record to the server.
pub async fn report_step<C: Client>(client: &C, state: &State, name: &str) {
    let Some(record) = state.step(name) else {
        return;
    };
    match client.update_step(&record).await {
        Ok(updated) => state.absorb_step(&updated),
        Err(err) => {
            tracing::warn!(step = name, error = %err, "cannot update step");
        }
    }
}

/// Push the stage record, steps included, to the server.
pub async fn report_stage<C: Client>(client: &C, state: &State) {
    let record = state.snapshot();
    match client.update_stage(&record).await {
        Ok(updated) => state.absorb_stage(&updated),
        Err(err) => {
            tracing::warn!(stage = record.id, error = %err, "cannot update stage");
        }
    }
}
