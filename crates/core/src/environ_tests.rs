// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn combine_later_layers_win() {
    let merged = combine(&[
        env(&[("A", "1"), ("B", "1")]),
        env(&[("B", "2")]),
        env(&[("C", "3")]),
    ]);
    assert_eq!(merged.get("A").unwrap(), "1");
    assert_eq!(merged.get("B").unwrap(), "2");
    assert_eq!(merged.get("C").unwrap(), "3");
}

#[test]
fn build_env_for_pull_request() {
    let b = Build {
        event: crate::build::event::PULL_REQUEST.to_string(),
        git_ref: "refs/pull/42/merge".to_string(),
        source: "feature".to_string(),
        target: "main".to_string(),
        ..Default::default()
    };
    let vars = build(&b);
    assert_eq!(vars.get("DRONE_PULL_REQUEST").unwrap(), "42");
    assert_eq!(vars.get("DRONE_SOURCE_BRANCH").unwrap(), "feature");
    assert_eq!(vars.get("DRONE_TARGET_BRANCH").unwrap(), "main");
}

#[test]
fn build_env_for_tag() {
    let b = Build {
        event: crate::build::event::TAG.to_string(),
        git_ref: "refs/tags/v1.2.3".to_string(),
        ..Default::default()
    };
    let vars = build(&b);
    assert_eq!(vars.get("DRONE_TAG").unwrap(), "v1.2.3");
}

#[test]
fn link_env_points_at_the_build() {
    let r = Repo {
        slug: "octocat/hello-world".to_string(),
        ..Default::default()
    };
    let b = Build {
        number: 7,
        ..Default::default()
    };
    let s = System {
        proto: "https".to_string(),
        host: "drone.company.com".to_string(),
        ..Default::default()
    };
    let vars = link(&r, &b, &s);
    assert_eq!(
        vars.get("DRONE_BUILD_LINK").unwrap(),
        "https://drone.company.com/octocat/hello-world/7"
    );
}

#[test]
fn system_env_marks_ci() {
    let vars = system(&System::default());
    assert_eq!(vars.get("CI").unwrap(), "true");
    assert_eq!(vars.get("DRONE").unwrap(), "true");
}
