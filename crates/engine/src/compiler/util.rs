// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure helpers for the compiler: dependency wiring, run-policy
//! derivation and environment conversion.

use crate::spec::{SecretVar, Spec};
use gantry_manifest::types::{Condition, Step as ManifestStep};
use gantry_manifest::Variable;
use std::collections::BTreeMap;

/// True when any step declares an explicit dependency.
pub fn is_graph(spec: &Spec) -> bool {
    spec.steps.iter().any(|step| !step.depends_on.is_empty())
}

/// Chain steps serially: each step depends on its predecessor.
pub fn configure_serial(spec: &mut Spec) {
    let names: Vec<String> = spec.steps.iter().map(|s| s.name.clone()).collect();
    for (index, step) in spec.steps.iter_mut().enumerate() {
        if index > 0 {
            step.depends_on = vec![names[index - 1].clone()];
        }
    }
}

/// Give every root of the graph the clone step as its dependency.
pub fn configure_clone_deps(spec: &mut Spec) {
    for step in &mut spec.steps {
        if step.name == "clone" {
            continue;
        }
        if step.depends_on.is_empty() {
            step.depends_on = vec!["clone".to_string()];
        }
    }
}

/// Strip `clone` from dependency sets when the clone step is disabled.
/// A no-op when a clone step still exists in the plan.
pub fn remove_clone_deps(spec: &mut Spec) {
    if spec.steps.iter().any(|step| step.name == "clone") {
        return;
    }
    for step in &mut spec.steps {
        step.depends_on.retain(|dep| dep != "clone");
    }
}

/// A step runs regardless of dependency outcome when its status
/// include set names both success and failure.
pub fn is_run_always(step: &ManifestStep) -> bool {
    let include = &step.when.status.include;
    include.iter().any(|s| s == "success") && include.iter().any(|s| s == "failure")
}

/// A step runs after failed dependencies when its status include set
/// names failure.
pub fn is_run_on_failure(step: &ManifestStep) -> bool {
    step.when.status.include.iter().any(|s| s == "failure")
}

/// Inline environment values declared by a step.
pub fn convert_static_env(vars: &BTreeMap<String, Variable>) -> BTreeMap<String, String> {
    let mut envs = BTreeMap::new();
    for (name, variable) in vars {
        if let Variable::Value(value) = variable {
            envs.insert(name.clone(), value.clone());
        }
    }
    envs
}

/// Secret-backed environment values declared by a step.
pub fn convert_secret_env(vars: &BTreeMap<String, Variable>) -> Vec<SecretVar> {
    let mut envs = Vec::new();
    for (name, variable) in vars {
        if let Variable::Secret {
            from_secret,
            required,
        } = variable
        {
            envs.push(SecretVar {
                name: from_secret.clone(),
                env: name.clone(),
                required: *required,
            });
        }
    }
    envs
}

/// Plugin settings become `PLUGIN_`-prefixed environment variables.
/// Scalars stringify; lists flatten to comma-separated values.
pub fn convert_settings(
    settings: &BTreeMap<String, serde_yaml::Value>,
) -> BTreeMap<String, String> {
    let mut envs = BTreeMap::new();
    for (name, value) in settings {
        let Some(value) = settings_value(value) else {
            continue;
        };
        envs.insert(format!("PLUGIN_{}", name.to_uppercase()), value);
    }
    envs
}

fn settings_value(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Sequence(items) => Some(
            items
                .iter()
                .filter_map(settings_value)
                .collect::<Vec<_>>()
                .join(","),
        ),
        _ => None,
    }
}

/// Evaluate an include/exclude matcher against a candidate value.
pub fn condition_match(condition: &Condition, value: &str) -> bool {
    if condition
        .exclude
        .iter()
        .any(|pattern| glob_match(pattern, value))
    {
        return false;
    }
    if condition.include.is_empty() {
        return true;
    }
    condition
        .include
        .iter()
        .any(|pattern| glob_match(pattern, value))
}

/// Minimal glob: `*` matches any run of characters.
fn glob_match(pattern: &str, value: &str) -> bool {
    fn inner(pattern: &[u8], value: &[u8]) -> bool {
        match (pattern.first(), value.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                inner(&pattern[1..], value)
                    || (!value.is_empty() && inner(pattern, &value[1..]))
            }
            (Some(p), Some(v)) if p == v => inner(&pattern[1..], &value[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), value.as_bytes())
}

/// Fold step commands into a single traced shell script.
pub fn script(commands: &[String]) -> String {
    let mut out = String::from("set -e\n");
    for command in commands {
        out.push_str(&format!("echo + {}\n", shell_quote(command)));
        out.push_str(command);
        out.push('\n');
    }
    out
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[cfg(test)]
#[path = "util_tests.rs"]
mod tests;
