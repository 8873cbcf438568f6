// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gantry_client::FakeClient;
use gantry_core::{Stage, SystemClock};
use gantry_engine::fake::{EngineCall, FakeEngine, StepScript};
use std::time::Duration;

fn step(name: &str, deps: &[&str]) -> Step {
    Step {
        name: name.to_string(),
        id: name.to_string(),
        depends_on: deps.iter().map(|d| d.to_string()).collect(),
        ..Default::default()
    }
}

fn with_policy(mut step: Step, policy: RunPolicy) -> Step {
    step.run_policy = policy;
    step
}

fn spec_of(steps: Vec<Step>) -> Arc<Spec> {
    Arc::new(Spec {
        pod_name: "drone-1".to_string(),
        namespace: "drone-1".to_string(),
        steps,
        ..Default::default()
    })
}

async fn run_spec(
    engine: &FakeEngine,
    client: &FakeClient,
    spec: Arc<Spec>,
    cancel: CancellationToken,
) -> Arc<State> {
    let state = Arc::new(State::new(Stage::default()));
    state.prepare(&spec);
    exec(
        Arc::new(engine.clone()),
        client.clone(),
        SystemClock,
        spec,
        Arc::clone(&state),
        cancel,
    )
    .await;
    state
}

fn assert_finished_before_started(engine: &FakeEngine, first: &str, second: &str) {
    let finished = engine
        .call_index(&EngineCall::Finished {
            step: first.to_string(),
        })
        .unwrap_or_else(|| panic!("{first} never finished"));
    let started = engine
        .call_index(&EngineCall::Started {
            step: second.to_string(),
        })
        .unwrap_or_else(|| panic!("{second} never started"));
    assert!(
        finished < started,
        "{second} started before {first} finished"
    );
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn serial_chain_runs_in_order() {
    let engine = FakeEngine::new();
    let client = FakeClient::new();
    let spec = spec_of(vec![
        step("build", &[]),
        step("test", &["build"]),
        step("deploy", &["test"]),
    ]);

    let state = run_spec(&engine, &client, spec, CancellationToken::new()).await;

    assert_finished_before_started(&engine, "build", "test");
    assert_finished_before_started(&engine, "test", "deploy");
    assert_eq!(state.finish_stage(0), Status::Success);
}

#[tokio::test]
async fn fan_out_waits_for_every_dependency() {
    let engine = FakeEngine::new();
    engine.set_delay(Duration::from_millis(10));
    let client = FakeClient::new();
    let spec = spec_of(vec![
        step("clone", &[]),
        step("backend", &["clone"]),
        step("frontend", &["clone"]),
        step("deploy", &["backend", "frontend"]),
    ]);

    let state = run_spec(&engine, &client, spec, CancellationToken::new()).await;

    assert_finished_before_started(&engine, "clone", "backend");
    assert_finished_before_started(&engine, "clone", "frontend");
    assert_finished_before_started(&engine, "backend", "deploy");
    assert_finished_before_started(&engine, "frontend", "deploy");
    assert!(state.all_done());
}

// ============================================================================
// Run policies against dependency outcomes
// ============================================================================

#[tokio::test]
async fn failed_dependency_drives_policies() {
    let engine = FakeEngine::new();
    engine.script("build", StepScript::Exit(1));
    let client = FakeClient::new();
    let spec = spec_of(vec![
        step("build", &[]),
        with_policy(step("on-success", &["build"]), RunPolicy::OnSuccess),
        with_policy(step("on-failure", &["build"]), RunPolicy::OnFailure),
        with_policy(step("always", &["build"]), RunPolicy::Always),
    ]);

    let state = run_spec(&engine, &client, spec, CancellationToken::new()).await;

    assert_eq!(state.status_of("build"), Status::Failure);
    assert_eq!(state.status_of("on-success"), Status::Skipped);
    assert_eq!(state.status_of("on-failure"), Status::Success);
    assert_eq!(state.status_of("always"), Status::Success);
    assert_eq!(state.finish_stage(0), Status::Failure);
}

#[tokio::test]
async fn successful_dependency_skips_failure_handlers() {
    let engine = FakeEngine::new();
    let client = FakeClient::new();
    let spec = spec_of(vec![
        step("build", &[]),
        with_policy(step("on-failure", &["build"]), RunPolicy::OnFailure),
        with_policy(step("always", &["build"]), RunPolicy::Always),
    ]);

    let state = run_spec(&engine, &client, spec, CancellationToken::new()).await;

    assert_eq!(state.status_of("build"), Status::Success);
    assert_eq!(state.status_of("on-failure"), Status::Skipped);
    assert_eq!(state.status_of("always"), Status::Success);
}

#[tokio::test]
async fn killed_dependency_satisfies_neither_policy() {
    let engine = FakeEngine::new();
    engine.script("build", StepScript::Hang);
    let client = FakeClient::new();
    let cancel = CancellationToken::new();
    let spec = spec_of(vec![
        step("build", &[]),
        with_policy(step("on-failure", &["build"]), RunPolicy::OnFailure),
        with_policy(step("always", &["build"]), RunPolicy::Always),
    ]);

    let killer = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        killer.cancel();
    });
    let state = run_spec(&engine, &client, spec, cancel).await;

    assert_eq!(state.status_of("build"), Status::Killed);
    assert_eq!(state.status_of("on-failure"), Status::Skipped);
    // Cancellation skips everything that has not started, even
    // run-always steps.
    assert_eq!(state.status_of("always"), Status::Skipped);
    assert_eq!(state.finish_stage(0), Status::Killed);
}

#[tokio::test]
async fn ignored_failure_reads_as_success_for_dependents() {
    let engine = FakeEngine::new();
    engine.script("lint", StepScript::Exit(1));
    let client = FakeClient::new();
    let mut lint = step("lint", &[]);
    lint.err_policy = ErrPolicy::Ignore;
    let spec = spec_of(vec![
        lint,
        with_policy(step("build", &["lint"]), RunPolicy::OnSuccess),
    ]);

    let state = run_spec(&engine, &client, spec, CancellationToken::new()).await;

    // The dependent ran, but the real status is still reported.
    assert_eq!(state.status_of("lint"), Status::Failure);
    assert_eq!(state.status_of("build"), Status::Success);
    assert_eq!(state.finish_stage(0), Status::Success);
}

// ============================================================================
// Outcome mapping
// ============================================================================

#[tokio::test]
async fn exit_codes_map_to_statuses() {
    let engine = FakeEngine::new();
    engine.script("oom", StepScript::OomKilled);
    engine.script("bad", StepScript::Exit(2));
    engine.script("broken", StepScript::Error);
    let client = FakeClient::new();
    let spec = spec_of(vec![
        with_policy(step("ok", &[]), RunPolicy::Always),
        with_policy(step("bad", &[]), RunPolicy::Always),
        with_policy(step("oom", &[]), RunPolicy::Always),
        with_policy(step("broken", &[]), RunPolicy::Always),
    ]);

    let state = run_spec(&engine, &client, spec, CancellationToken::new()).await;

    assert_eq!(state.status_of("ok"), Status::Success);
    assert_eq!(state.status_of("bad"), Status::Failure);
    assert_eq!(state.step("bad").unwrap().exit_code, 2);
    assert_eq!(state.status_of("oom"), Status::Failure);
    assert_eq!(state.step("oom").unwrap().error, "OOMKilled");
    assert_eq!(state.status_of("broken"), Status::Error);
    assert_eq!(state.finish_stage(0), Status::Error);
}

#[tokio::test]
async fn error_in_dependency_satisfies_on_failure() {
    let engine = FakeEngine::new();
    engine.script("build", StepScript::Error);
    let client = FakeClient::new();
    let spec = spec_of(vec![
        step("build", &[]),
        with_policy(step("cleanup", &["build"]), RunPolicy::OnFailure),
    ]);

    let state = run_spec(&engine, &client, spec, CancellationToken::new()).await;

    assert_eq!(state.status_of("build"), Status::Error);
    assert_eq!(state.status_of("cleanup"), Status::Success);
}

// ============================================================================
// Never steps, detached services, reporting
// ============================================================================

#[tokio::test]
async fn never_steps_are_not_run_or_reported() {
    let engine = FakeEngine::new();
    let client = FakeClient::new();
    let spec = spec_of(vec![
        step("build", &[]),
        with_policy(step("publish", &[]), RunPolicy::Never),
    ]);

    let state = run_spec(&engine, &client, spec, CancellationToken::new()).await;

    assert!(state.all_done());
    assert!(engine
        .call_index(&EngineCall::Started {
            step: "publish".to_string()
        })
        .is_none());
    assert!(!client
        .step_updates()
        .iter()
        .any(|record| record.name == "publish"));
}

#[tokio::test]
async fn detached_service_does_not_gate_dependents() {
    let engine = FakeEngine::new();
    engine.script("database", StepScript::Hang);
    let client = FakeClient::new();
    let mut database = step("database", &[]);
    database.detach = true;
    let spec = spec_of(vec![database, step("test", &["database"])]);

    let cancel = CancellationToken::new();
    let state = run_spec(&engine, &client, spec, cancel.clone()).await;
    cancel.cancel();

    assert_eq!(state.status_of("database"), Status::Success);
    assert_eq!(state.status_of("test"), Status::Success);
}

#[tokio::test]
async fn dependency_cycle_skips_instead_of_hanging() {
    let engine = FakeEngine::new();
    let client = FakeClient::new();
    let spec = spec_of(vec![
        step("build", &[]),
        step("a", &["b"]),
        step("b", &["a"]),
    ]);

    let state = run_spec(&engine, &client, spec, CancellationToken::new()).await;

    assert_eq!(state.status_of("build"), Status::Success);
    assert_eq!(state.status_of("a"), Status::Skipped);
    assert_eq!(state.status_of("b"), Status::Skipped);
}

#[tokio::test]
async fn steps_report_running_then_terminal() {
    let engine = FakeEngine::new();
    let client = FakeClient::new();
    let spec = spec_of(vec![step("build", &[])]);

    run_spec(&engine, &client, spec, CancellationToken::new()).await;

    let updates: Vec<Status> = client
        .step_updates()
        .iter()
        .filter(|record| record.name == "build")
        .map(|record| record.status)
        .collect();
    assert_eq!(updates, vec![Status::Running, Status::Success]);
}
