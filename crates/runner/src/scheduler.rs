// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrent DAG scheduler.
//!
//! Each in-flight step owns one worker task. A step becomes eligible
//! once every dependency is terminal and its run policy accepts the
//! aggregate dependency outcome; steps whose policy cannot be
//! satisfied are skipped deterministically. There is no in-process
//! concurrency cap: the orchestrator arbitrates actual cpu and
//! memory.

use crate::reporter;
use crate::state::State;
use crate::streamer::RemoteLog;
use gantry_client::Client;
use gantry_core::{Clock, Status};
use gantry_engine::spec::{ErrPolicy, RunPolicy, Spec, Step};
use gantry_engine::{Engine, EngineError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Aggregate dependency outcome, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum DepStatus {
    Success,
    Failure,
    Error,
    Killed,
}

/// Execute every step of the spec to a terminal status.
pub async fn exec<E, C, K>(
    engine: Arc<E>,
    client: C,
    clock: K,
    spec: Arc<Spec>,
    state: Arc<State>,
    cancel: CancellationToken,
) where
    E: Engine,
    C: Client,
    K: Clock,
{
    let notify = Arc::new(Notify::new());
    let in_flight = Arc::new(AtomicUsize::new(0));
    let mut scheduled: HashSet<String> = HashSet::new();

    loop {
        let mut eligible: Vec<Step> = Vec::new();

        for step in &spec.steps {
            if scheduled.contains(&step.name) {
                continue;
            }
            if step.run_policy == RunPolicy::Never {
                scheduled.insert(step.name.clone());
                continue;
            }
            if cancel.is_cancelled() {
                // Not-yet-started steps are skipped on cancellation.
                scheduled.insert(step.name.clone());
                state.skip_step(&step.name, clock.unix_now());
                reporter::report_step(&client, &state, &step.name).await;
                continue;
            }

            let Some(dep_status) = aggregate_deps(&spec, &state, step) else {
                continue; // a dependency is still in flight
            };
            let satisfied = match step.run_policy {
                RunPolicy::Always => true,
                RunPolicy::OnSuccess => dep_status == DepStatus::Success,
                RunPolicy::OnFailure => {
                    dep_status == DepStatus::Failure || dep_status == DepStatus::Error
                }
                RunPolicy::Never => false,
            };
            scheduled.insert(step.name.clone());
            if satisfied {
                eligible.push(step.clone());
            } else {
                state.skip_step(&step.name, clock.unix_now());
                reporter::report_step(&client, &state, &step.name).await;
            }
        }

        let dispatched = eligible.len();
        for step in eligible {
            in_flight.fetch_add(1, Ordering::SeqCst);
            dispatch(
                Arc::clone(&engine),
                client.clone(),
                clock.clone(),
                Arc::clone(&spec),
                Arc::clone(&state),
                cancel.clone(),
                Arc::clone(&notify),
                Arc::clone(&in_flight),
                step,
            );
        }

        if scheduled.len() == spec.steps.len() && state.all_done() {
            return;
        }

        // A pass that neither dispatched nor has anything in flight
        // cannot make progress: the remaining dependency edges form a
        // cycle. Skip what is left rather than wait forever.
        if dispatched == 0
            && in_flight.load(Ordering::SeqCst) == 0
            && scheduled.len() < spec.steps.len()
            && !cancel.is_cancelled()
        {
            for step in &spec.steps {
                if scheduled.insert(step.name.clone()) {
                    tracing::error!(step = %step.name, "unresolvable dependency graph, skipping");
                    state.skip_step(&step.name, clock.unix_now());
                    reporter::report_step(&client, &state, &step.name).await;
                }
            }
            continue;
        }

        if cancel.is_cancelled() {
            // Everything pending is already skipped; only in-flight
            // completions can make progress now.
            notify.notified().await;
        } else {
            tokio::select! {
                _ = notify.notified() => {}
                _ = cancel.cancelled() => {}
            }
        }
    }
}

/// Aggregate dependency outcome, or None while any dependency is
/// still pending or running. Skipped dependencies and dependencies
/// whose failures are ignored count as success.
fn aggregate_deps(spec: &Spec, state: &State, step: &Step) -> Option<DepStatus> {
    let mut worst = DepStatus::Success;
    for dep in &step.depends_on {
        let Some(dep_step) = spec.step(dep) else {
            // Unknown names are rejected at compile time; treat a
            // stray reference as satisfied rather than deadlock.
            continue;
        };
        if dep_step.run_policy == RunPolicy::Never {
            continue;
        }
        let status = state.status_of(dep);
        if !status.is_done() {
            return None;
        }
        let effective = if dep_step.err_policy == ErrPolicy::Ignore {
            DepStatus::Success
        } else {
            match status {
                Status::Failure => DepStatus::Failure,
                Status::Error => DepStatus::Error,
                Status::Killed => DepStatus::Killed,
                _ => DepStatus::Success,
            }
        };
        worst = worst.max(effective);
    }
    Some(worst)
}

#[allow(clippy::too_many_arguments)]
fn dispatch<E, C, K>(
    engine: Arc<E>,
    client: C,
    clock: K,
    spec: Arc<Spec>,
    state: Arc<State>,
    cancel: CancellationToken,
    notify: Arc<Notify>,
    in_flight: Arc<AtomicUsize>,
    step: Step,
) where
    E: Engine,
    C: Client,
    K: Clock,
{
    tokio::spawn(async move {
        let mut step = step;
        // Convey current stage status to the container annotations.
        for (key, value) in state.status_envs() {
            step.envs.insert(key, value);
        }

        state.start_step(&step.name, clock.unix_now());
        reporter::report_step(&client, &state, &step.name).await;

        let record = state.step(&step.name).unwrap_or_default();
        let output = RemoteLog::new(client.clone(), clock.clone(), record.id);
        output.spawn_flusher(cancel.clone());

        if step.detach {
            // Detached steps run in the background for the rest of the
            // stage and never gate their dependents.
            let engine = Arc::clone(&engine);
            let spec = Arc::clone(&spec);
            let service = step.clone();
            let service_cancel = cancel.clone();
            let service_output = output.clone();
            tokio::spawn(async move {
                let _ = engine
                    .run(&spec, &service, service_output, &service_cancel)
                    .await;
            });
            state.finish_step(&step.name, Status::Success, 0, None, clock.unix_now());
            reporter::report_step(&client, &state, &step.name).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            notify.notify_one();
            return;
        }

        let result = engine
            .run(&spec, &step, output.clone(), &cancel)
            .await;
        output.close().await;

        let now = clock.unix_now();
        match result {
            Ok(exit) if exit.oom_killed => {
                state.finish_step(&step.name, Status::Failure, exit.exit_code, Some("OOMKilled"), now);
            }
            Ok(exit) if exit.exit_code == 0 => {
                state.finish_step(&step.name, Status::Success, 0, None, now);
            }
            Ok(exit) => {
                state.finish_step(&step.name, Status::Failure, exit.exit_code, None, now);
            }
            Err(EngineError::Cancelled) => {
                state.finish_step(&step.name, Status::Killed, 0, None, now);
            }
            Err(err) if cancel.is_cancelled() => {
                tracing::debug!(step = %step.name, error = %err, "step interrupted by cancellation");
                state.finish_step(&step.name, Status::Killed, 0, None, now);
            }
            Err(err) => {
                tracing::error!(step = %step.name, error = %err, "step failed");
                state.finish_step(&step.name, Status::Error, 0, Some(&err.to_string()), now);
            }
        }
        reporter::report_step(&client, &state, &step.name).await;
        in_flight.fetch_sub(1, Ordering::SeqCst);
        notify.notify_one();
    });
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
