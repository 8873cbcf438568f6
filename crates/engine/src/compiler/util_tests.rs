// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::spec::Step;

fn spec_with(steps: &[(&str, &[&str])]) -> Spec {
    Spec {
        steps: steps
            .iter()
            .map(|(name, deps)| Step {
                name: name.to_string(),
                depends_on: deps.iter().map(|d| d.to_string()).collect(),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

fn deps(spec: &Spec, name: &str) -> Vec<String> {
    spec.step(name).unwrap().depends_on.clone()
}

// ============================================================================
// Dependency wiring
// ============================================================================

#[test]
fn graph_detection() {
    let serial = spec_with(&[("build", &[]), ("test", &[])]);
    assert!(!is_graph(&serial));

    let graph = spec_with(&[("build", &["clone"]), ("test", &[])]);
    assert!(is_graph(&graph));
}

#[test]
fn serial_chains_each_step_to_its_predecessor() {
    let mut spec = spec_with(&[("build", &[]), ("test", &[]), ("deploy", &[])]);
    configure_serial(&mut spec);

    assert!(deps(&spec, "build").is_empty());
    assert_eq!(deps(&spec, "test"), vec!["build"]);
    assert_eq!(deps(&spec, "deploy"), vec!["test"]);
}

#[test]
fn clone_deps_injected_for_graph_roots() {
    let mut spec = spec_with(&[
        ("clone", &[]),
        ("backend", &[]),
        ("frontend", &[]),
        ("deploy", &["backend", "frontend"]),
    ]);
    configure_clone_deps(&mut spec);

    assert!(deps(&spec, "clone").is_empty());
    assert_eq!(deps(&spec, "backend"), vec!["clone"]);
    assert_eq!(deps(&spec, "frontend"), vec!["clone"]);
    assert_eq!(deps(&spec, "deploy"), vec!["backend", "frontend"]);
}

#[test]
fn clone_deps_removed_when_clone_is_gone() {
    let mut spec = spec_with(&[
        ("backend", &["clone"]),
        ("frontend", &["clone"]),
        ("deploy", &["backend", "frontend"]),
    ]);
    remove_clone_deps(&mut spec);

    assert!(deps(&spec, "backend").is_empty());
    assert!(deps(&spec, "frontend").is_empty());
    assert_eq!(deps(&spec, "deploy"), vec!["backend", "frontend"]);
}

#[test]
fn clone_deps_kept_while_clone_exists() {
    let mut spec = spec_with(&[("clone", &[]), ("test", &["clone"])]);
    remove_clone_deps(&mut spec);
    assert_eq!(deps(&spec, "test"), vec!["clone"]);
}

#[test]
fn multi_dep_set_retains_other_entries() {
    let mut spec = spec_with(&[("restore", &[]), ("test", &["clone", "restore"])]);
    remove_clone_deps(&mut spec);
    assert_eq!(deps(&spec, "test"), vec!["restore"]);
}

// ============================================================================
// Run policies
// ============================================================================

fn step_with_status(include: &[&str]) -> ManifestStep {
    let mut step = ManifestStep::default();
    step.when.status.include = include.iter().map(|s| s.to_string()).collect();
    step
}

#[test]
fn run_always_requires_both_statuses() {
    assert!(!is_run_always(&step_with_status(&[])));
    assert!(!is_run_always(&step_with_status(&["success"])));
    assert!(!is_run_always(&step_with_status(&["failure"])));
    assert!(is_run_always(&step_with_status(&["success", "failure"])));
}

#[test]
fn run_on_failure_requires_failure_status() {
    assert!(!is_run_on_failure(&step_with_status(&[])));
    assert!(!is_run_on_failure(&step_with_status(&["success"])));
    assert!(is_run_on_failure(&step_with_status(&["failure"])));
    assert!(is_run_on_failure(&step_with_status(&["success", "failure"])));
}

// ============================================================================
// Environment conversion
// ============================================================================

#[test]
fn static_env_keeps_inline_values_only() {
    let mut vars = BTreeMap::new();
    vars.insert(
        "username".to_string(),
        Variable::Value("octocat".to_string()),
    );
    vars.insert(
        "password".to_string(),
        Variable::Secret {
            from_secret: "password".to_string(),
            required: false,
        },
    );

    let envs = convert_static_env(&vars);
    assert_eq!(envs.len(), 1);
    assert_eq!(envs.get("username").unwrap(), "octocat");
}

#[test]
fn secret_env_keeps_secret_references_only() {
    let mut vars = BTreeMap::new();
    vars.insert(
        "USERNAME".to_string(),
        Variable::Value("octocat".to_string()),
    );
    vars.insert(
        "PASSWORD".to_string(),
        Variable::Secret {
            from_secret: "password".to_string(),
            required: true,
        },
    );

    let envs = convert_secret_env(&vars);
    assert_eq!(
        envs,
        vec![SecretVar {
            name: "password".to_string(),
            env: "PASSWORD".to_string(),
            required: true,
        }]
    );
}

#[test]
fn settings_become_plugin_env() {
    let mut settings = BTreeMap::new();
    settings.insert(
        "repo".to_string(),
        serde_yaml::Value::String("octocat/hello-world".to_string()),
    );
    settings.insert("dry_run".to_string(), serde_yaml::Value::Bool(true));
    settings.insert(
        "tags".to_string(),
        serde_yaml::Value::Sequence(vec![
            serde_yaml::Value::String("latest".to_string()),
            serde_yaml::Value::String("1.0".to_string()),
        ]),
    );

    let envs = convert_settings(&settings);
    assert_eq!(envs.get("PLUGIN_REPO").unwrap(), "octocat/hello-world");
    assert_eq!(envs.get("PLUGIN_DRY_RUN").unwrap(), "true");
    assert_eq!(envs.get("PLUGIN_TAGS").unwrap(), "latest,1.0");
}

// ============================================================================
// Conditions and scripts
// ============================================================================

#[test]
fn condition_empty_include_matches_everything() {
    let condition = Condition::default();
    assert!(condition_match(&condition, "main"));
}

#[test]
fn condition_include_and_exclude() {
    let condition = Condition {
        include: vec!["main".to_string(), "release/*".to_string()],
        exclude: vec!["release/wip".to_string()],
    };
    assert!(condition_match(&condition, "main"));
    assert!(condition_match(&condition, "release/1.0"));
    assert!(!condition_match(&condition, "release/wip"));
    assert!(!condition_match(&condition, "feature"));
}

#[test]
fn script_traces_each_command() {
    let commands = vec!["go build".to_string(), "go test ./...".to_string()];
    let out = script(&commands);
    assert_eq!(
        out,
        "set -e\necho + 'go build'\ngo build\necho + 'go test ./...'\ngo test ./...\n"
    );
}
