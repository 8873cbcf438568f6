// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gantry_client::{ClientCall, FakeClient};
use gantry_core::{Status, System, SystemClock};
use gantry_engine::fake::{EngineCall, FakeEngine, StepScript};
use gantry_core::Secret;

const CONFIG: &str = r#"
kind: pipeline
name: default
clone:
  disable: true
steps:
  - name: build
    image: golang
    commands:
      - go build
  - name: test
    image: golang
    commands:
      - go test ./...
"#;

fn test_runner(client: FakeClient, engine: FakeEngine) -> Runner<FakeClient, FakeEngine, SystemClock> {
    Runner {
        client,
        engine: Arc::new(engine),
        compiler: Compiler::default(),
        machine: "worker-1".to_string(),
        environ: BTreeMap::new(),
        registries: Arc::new(registry::Static::new(Vec::new())),
        match_func: None,
        clock: SystemClock,
    }
}

fn test_context(config: &str) -> StageContext {
    StageContext {
        stage: test_stage(),
        build: Build {
            id: 9,
            number: 7,
            event: "push".to_string(),
            target: "main".to_string(),
            ..Default::default()
        },
        repo: Repo {
            id: 3,
            name: "hello-world".to_string(),
            slug: "octocat/hello-world".to_string(),
            trusted: false,
            timeout: 60,
            ..Default::default()
        },
        system: System::default(),
        config: config.to_string(),
        secrets: Vec::new(),
        netrc: None,
    }
}

fn test_stage() -> Stage {
    Stage {
        id: 42,
        build_id: 9,
        number: 1,
        name: "default".to_string(),
        status: Status::Pending,
        ..Default::default()
    }
}

#[tokio::test]
async fn happy_path_runs_stage_to_success() {
    let client = FakeClient::new();
    let engine = FakeEngine::new();
    client.set_context(test_context(CONFIG));
    let runner = test_runner(client.clone(), engine.clone());

    runner.run(test_stage()).await.unwrap();

    // Accepted, detailed, moved to running, executed, reported done.
    assert!(client.calls().contains(&ClientCall::Accept { stage_id: 42 }));
    assert!(client.calls().contains(&ClientCall::Detail { stage_id: 42 }));

    let stage_updates = client.stage_updates();
    assert_eq!(stage_updates[0].status, Status::Running);
    assert_eq!(stage_updates[0].machine, "worker-1");
    assert_eq!(stage_updates[0].steps.len(), 2);
    let last = stage_updates.last().unwrap();
    assert_eq!(last.status, Status::Success);
    assert!(last.steps.iter().all(|s| s.status == Status::Success));

    // Setup ran before the steps, destroy after them.
    let calls = engine.calls();
    assert_eq!(calls.first(), Some(&EngineCall::Setup));
    assert_eq!(calls.last(), Some(&EngineCall::Destroy));
}

#[tokio::test]
async fn optimistic_lock_is_not_an_error() {
    let client = FakeClient::new();
    let engine = FakeEngine::new();
    client.set_accept_conflict();
    let runner = test_runner(client.clone(), engine.clone());

    runner.run(test_stage()).await.unwrap();

    // Another runner owns the stage; nothing else happens.
    assert!(!client
        .calls()
        .iter()
        .any(|call| matches!(call, ClientCall::Detail { .. })));
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn invalid_config_fails_everything_once() {
    let client = FakeClient::new();
    let engine = FakeEngine::new();
    client.set_context(test_context("kind: pipeline\nname: default\n\tbroken"));
    let runner = test_runner(client.clone(), engine.clone());

    runner.run(test_stage()).await.unwrap();

    let updates = client.stage_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].status, Status::Error);
    assert!(!updates[0].error.is_empty());
    // No engine setup for a config that never compiled.
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn lint_rejection_fails_everything_once() {
    let config = r#"
kind: pipeline
name: default
steps:
  - name: dind
    image: docker:dind
    privileged: true
"#;
    let client = FakeClient::new();
    let engine = FakeEngine::new();
    client.set_context(test_context(config));
    let runner = test_runner(client.clone(), engine.clone());

    runner.run(test_stage()).await.unwrap();

    let updates = client.stage_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].status, Status::Error);
    assert!(updates[0].error.contains("privileged"));
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn missing_pipeline_resource_fails_everything() {
    let client = FakeClient::new();
    let engine = FakeEngine::new();
    let mut context = test_context(CONFIG);
    context.stage.name = "missing".to_string();
    client.set_context(context);
    let runner = test_runner(client.clone(), engine.clone());

    let mut stage = test_stage();
    stage.name = "missing".to_string();
    runner.run(stage).await.unwrap();

    let updates = client.stage_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].status, Status::Error);
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn match_gate_rejects_stage() {
    let client = FakeClient::new();
    let engine = FakeEngine::new();
    client.set_context(test_context(CONFIG));
    let mut runner = test_runner(client.clone(), engine.clone());
    runner.match_func = Some(Arc::new(|_repo, _build| false));

    runner.run(test_stage()).await.unwrap();

    let updates = client.stage_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].status, Status::Error);
    assert_eq!(
        updates[0].error,
        "insufficient permission to run the pipeline"
    );
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn setup_failure_fails_steps_and_still_destroys() {
    let client = FakeClient::new();
    let engine = FakeEngine::new();
    engine.fail_setup();
    client.set_context(test_context(CONFIG));
    let runner = test_runner(client.clone(), engine.clone());

    runner.run(test_stage()).await.unwrap();

    let last = client.stage_updates().last().cloned().unwrap();
    assert_eq!(last.status, Status::Error);
    assert!(last.steps.iter().all(|s| s.status == Status::Error));

    let calls = engine.calls();
    assert_eq!(calls, vec![EngineCall::Setup, EngineCall::Destroy]);
}

#[tokio::test]
async fn remote_cancellation_kills_in_flight_steps() {
    let client = FakeClient::new();
    let engine = FakeEngine::new();
    engine.script("build", StepScript::Hang);
    client.set_context(test_context(CONFIG));
    let runner = test_runner(client.clone(), engine.clone());

    let cancel_client = client.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        cancel_client.cancel_build();
    });

    runner.run(test_stage()).await.unwrap();

    let last = client.stage_updates().last().cloned().unwrap();
    assert_eq!(last.status, Status::Killed);
    let build = last.steps.iter().find(|s| s.name == "build").unwrap();
    assert_eq!(build.status, Status::Killed);
    let test = last.steps.iter().find(|s| s.name == "test").unwrap();
    assert_eq!(test.status, Status::Skipped);
}

#[tokio::test]
async fn run_accepted_skips_the_accept_handshake() {
    let client = FakeClient::new();
    let engine = FakeEngine::new();
    client.set_context(test_context(CONFIG));
    let runner = test_runner(client.clone(), engine.clone());

    runner.run_accepted(42).await.unwrap();

    assert!(!client
        .calls()
        .iter()
        .any(|call| matches!(call, ClientCall::Accept { .. })));
    let last = client.stage_updates().last().cloned().unwrap();
    assert_eq!(last.status, Status::Success);
}

#[tokio::test]
async fn secrets_from_context_reach_the_spec() {
    let config = r#"
kind: pipeline
name: default
clone:
  disable: true
steps:
  - name: publish
    image: plugins/docker
    environment:
      PASSWORD:
        from_secret: password
"#;
    let client = FakeClient::new();
    let engine = FakeEngine::new();
    let mut context = test_context(config);
    context.secrets = vec![Secret {
        name: "password".to_string(),
        data: "hunter2".to_string(),
        pull_request: true,
    }];
    client.set_context(context);
    let runner = test_runner(client.clone(), engine.clone());

    runner.run(test_stage()).await.unwrap();

    let last = client.stage_updates().last().cloned().unwrap();
    assert_eq!(last.status, Status::Success);
}
