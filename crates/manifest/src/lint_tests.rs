// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::parser::parse;
use crate::types::Resource;

fn pipeline(yaml: &str) -> Pipeline {
    let manifest = parse(yaml).unwrap();
    match manifest.resources.into_iter().next().unwrap() {
        Resource::Pipeline(p) => p,
        _ => panic!("expected a pipeline resource"),
    }
}

#[test]
fn accepts_simple_pipeline() {
    let p = pipeline(
        r#"
kind: pipeline
name: default
steps:
  - name: build
    image: golang
"#,
    );
    assert!(lint(&p, false).is_ok());
}

#[test]
fn rejects_empty_pipeline() {
    let p = pipeline("kind: pipeline\nname: default\n");
    assert_eq!(lint(&p, false).unwrap_err(), LintError::NoSteps);
}

#[test]
fn rejects_missing_image() {
    let p = pipeline(
        r#"
kind: pipeline
name: default
steps:
  - name: build
"#,
    );
    assert_eq!(
        lint(&p, false).unwrap_err(),
        LintError::MissingImage("build".to_string())
    );
}

#[test]
fn rejects_duplicate_step_names() {
    let p = pipeline(
        r#"
kind: pipeline
name: default
steps:
  - name: build
    image: golang
  - name: build
    image: golang
"#,
    );
    assert_eq!(
        lint(&p, false).unwrap_err(),
        LintError::DuplicateName("build".to_string())
    );
}

#[test]
fn reserves_the_clone_step_name() {
    let p = pipeline(
        r#"
kind: pipeline
name: default
steps:
  - name: clone
    image: alpine
"#,
    );
    assert_eq!(
        lint(&p, false).unwrap_err(),
        LintError::DuplicateName("clone".to_string())
    );
}

#[test]
fn privileged_requires_trust() {
    let yaml = r#"
kind: pipeline
name: default
steps:
  - name: dind
    image: docker:dind
    privileged: true
"#;
    let p = pipeline(yaml);
    assert_eq!(lint(&p, false).unwrap_err(), LintError::Privileged);
    assert!(lint(&p, true).is_ok());
}

#[test]
fn host_network_requires_trust() {
    let yaml = r#"
kind: pipeline
name: default
host_network: true
steps:
  - name: build
    image: golang
"#;
    let p = pipeline(yaml);
    assert_eq!(lint(&p, false).unwrap_err(), LintError::HostNetwork);
    assert!(lint(&p, true).is_ok());
}

#[test]
fn host_path_requires_trust() {
    let yaml = r#"
kind: pipeline
name: default
steps:
  - name: build
    image: golang
volumes:
  - name: docker-socket
    host:
      path: /var/run/docker.sock
"#;
    let p = pipeline(yaml);
    assert_eq!(lint(&p, false).unwrap_err(), LintError::HostPath);
    assert!(lint(&p, true).is_ok());
}
