// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gantry_manifest::parse;

fn request<'a>(name: &'a str, build: &'a Build, repo: &'a Repo) -> Request<'a> {
    Request { name, build, repo }
}

#[tokio::test]
async fn find_matches_case_insensitively() {
    let provider = Static::new(vec![Secret {
        name: "docker_password".to_string(),
        data: "correct-horse-battery-staple".to_string(),
        pull_request: true,
    }]);
    let build = Build::default();
    let repo = Repo::default();

    let found = provider
        .find(&request("DOCKER_PASSWORD", &build, &repo))
        .await
        .unwrap();
    assert_eq!(found.unwrap().data, "correct-horse-battery-staple");
}

#[tokio::test]
async fn find_misses_unknown_name() {
    let provider = Static::new(vec![Secret {
        name: "token".to_string(),
        data: "secret".to_string(),
        pull_request: true,
    }]);
    let build = Build::default();
    let repo = Repo::default();

    let found = provider
        .find(&request("password", &build, &repo))
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn restricted_secret_hidden_from_pull_requests() {
    let provider = Static::new(vec![Secret {
        name: "token".to_string(),
        data: "secret".to_string(),
        pull_request: false,
    }]);
    let build = Build {
        event: event::PULL_REQUEST.to_string(),
        ..Default::default()
    };
    let repo = Repo::default();

    // Case-insensitive match, but restricted by policy.
    let found = provider
        .find(&request("TOKEN", &build, &repo))
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn granted_secret_visible_to_pull_requests() {
    let provider = Static::new(vec![Secret {
        name: "token".to_string(),
        data: "secret".to_string(),
        pull_request: true,
    }]);
    let build = Build {
        event: event::PULL_REQUEST.to_string(),
        ..Default::default()
    };
    let repo = Repo::default();

    let found = provider
        .find(&request("token", &build, &repo))
        .await
        .unwrap();
    assert!(found.is_some());
}

#[tokio::test]
async fn from_vars_builds_static_secrets() {
    let mut vars = BTreeMap::new();
    vars.insert("password".to_string(), "hunter2".to_string());
    let provider = Static::from_vars(&vars);
    let build = Build::default();
    let repo = Repo::default();

    let found = provider
        .find(&request("password", &build, &repo))
        .await
        .unwrap();
    assert_eq!(found.unwrap().data, "hunter2");
}

#[tokio::test]
async fn combine_returns_first_match() {
    let first = Static::new(vec![Secret {
        name: "token".to_string(),
        data: "from-first".to_string(),
        pull_request: true,
    }]);
    let second = Static::new(vec![Secret {
        name: "token".to_string(),
        data: "from-second".to_string(),
        pull_request: true,
    }]);
    let combined = Combine::new(vec![Arc::new(first), Arc::new(second)]);
    let build = Build::default();
    let repo = Repo::default();

    let found = combined
        .find(&request("token", &build, &repo))
        .await
        .unwrap();
    assert_eq!(found.unwrap().data, "from-first");
}

#[tokio::test]
async fn manifest_provider_resolves_embedded_secrets() {
    let manifest = parse(
        r#"
kind: pipeline
name: default
---
kind: secret
name: password
data: correct-horse-battery-staple
"#,
    )
    .unwrap();
    let provider = FromManifest::new(&manifest);
    let build = Build::default();
    let repo = Repo::default();

    let found = provider
        .find(&request("password", &build, &repo))
        .await
        .unwrap();
    assert_eq!(found.unwrap().data, "correct-horse-battery-staple");
}
