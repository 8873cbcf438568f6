// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::types::Variable;

// ============================================================================
// Basic parsing
// ============================================================================

#[test]
fn parse_empty_manifest() {
    let manifest = parse("").unwrap();
    assert!(manifest.resources.is_empty());
}

#[test]
fn parse_single_pipeline() {
    let yaml = r#"
kind: pipeline
type: kubernetes
name: default

steps:
  - name: build
    image: golang:1.21
    commands:
      - go build
      - go test ./...
"#;

    let manifest = parse(yaml).unwrap();
    assert_eq!(manifest.resources.len(), 1);

    let pipeline = lookup("default", &manifest).unwrap();
    assert_eq!(pipeline.kind, "kubernetes");
    assert_eq!(pipeline.steps.len(), 1);
    assert_eq!(pipeline.steps[0].name, "build");
    assert_eq!(pipeline.steps[0].image, "golang:1.21");
    assert_eq!(pipeline.steps[0].commands.len(), 2);
}

#[test]
fn parse_multiple_documents() {
    let yaml = r#"
kind: pipeline
name: backend
steps:
  - name: build
    image: golang
---
kind: pipeline
name: frontend
steps:
  - name: build
    image: node
---
kind: secret
name: password
data: correct-horse-battery-staple
"#;

    let manifest = parse(yaml).unwrap();
    assert_eq!(manifest.resources.len(), 3);
    assert!(lookup("backend", &manifest).is_ok());
    assert!(lookup("frontend", &manifest).is_ok());
}

#[test]
fn parse_step_environment() {
    let yaml = r#"
kind: pipeline
name: default
steps:
  - name: publish
    image: plugins/docker
    environment:
      USERNAME: octocat
      PASSWORD:
        from_secret: password
"#;

    let manifest = parse(yaml).unwrap();
    let pipeline = lookup("default", &manifest).unwrap();
    let env = &pipeline.steps[0].environment;
    assert_eq!(
        env.get("USERNAME").unwrap(),
        &Variable::Value("octocat".to_string())
    );
    assert_eq!(
        env.get("PASSWORD").unwrap(),
        &Variable::Secret {
            from_secret: "password".to_string(),
            required: false,
        }
    );
}

#[test]
fn parse_required_secret_environment() {
    let yaml = r#"
kind: pipeline
name: default
steps:
  - name: publish
    image: plugins/docker
    environment:
      PASSWORD:
        from_secret: password
        required: true
"#;

    let manifest = parse(yaml).unwrap();
    let pipeline = lookup("default", &manifest).unwrap();
    assert_eq!(
        pipeline.steps[0].environment.get("PASSWORD").unwrap(),
        &Variable::Secret {
            from_secret: "password".to_string(),
            required: true,
        }
    );
}

#[test]
fn parse_when_status_shorthand_and_map() {
    let yaml = r#"
kind: pipeline
name: default
steps:
  - name: notify
    image: plugins/slack
    when:
      status:
        - success
        - failure
  - name: only-main
    image: alpine
    when:
      branch:
        include: [main]
        exclude: [wip/*]
"#;

    let manifest = parse(yaml).unwrap();
    let pipeline = lookup("default", &manifest).unwrap();
    assert_eq!(
        pipeline.steps[0].when.status.include,
        vec!["success", "failure"]
    );
    assert_eq!(pipeline.steps[1].when.branch.include, vec!["main"]);
    assert_eq!(pipeline.steps[1].when.branch.exclude, vec!["wip/*"]);
}

#[test]
fn parse_depends_on_and_failure() {
    let yaml = r#"
kind: pipeline
name: default
steps:
  - name: deploy
    image: alpine
    failure: ignore
    depends_on:
      - backend
      - frontend
"#;

    let manifest = parse(yaml).unwrap();
    let pipeline = lookup("default", &manifest).unwrap();
    assert_eq!(pipeline.steps[0].failure, "ignore");
    assert_eq!(pipeline.steps[0].depends_on, vec!["backend", "frontend"]);
}

#[test]
fn parse_resources() {
    let yaml = r#"
kind: pipeline
name: default
steps:
  - name: build
    image: golang
    resources:
      requests:
        cpu: 250
        memory: 268435456
      limits:
        cpu: 1000
        memory: 1073741824
"#;

    let manifest = parse(yaml).unwrap();
    let pipeline = lookup("default", &manifest).unwrap();
    let resources = &pipeline.steps[0].resources;
    assert_eq!(resources.requests.cpu, Some(250));
    assert_eq!(resources.limits.memory, Some(1_073_741_824));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn parse_rejects_unknown_kind() {
    let yaml = "kind: cronjob\nname: nightly\n";
    assert!(parse(yaml).is_err());
}

#[test]
fn lookup_missing_resource() {
    let manifest = parse("kind: pipeline\nname: default\n").unwrap();
    let err = lookup("missing", &manifest).unwrap_err();
    assert!(matches!(err, ParseError::NotFound(name) if name == "missing"));
}

#[test]
fn lookup_empty_name_matches_first_pipeline() {
    let yaml = r#"
kind: secret
name: token
---
kind: pipeline
name: only
"#;
    let manifest = parse(yaml).unwrap();
    assert_eq!(lookup("", &manifest).unwrap().name, "only");
}
