// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment variable sets derived from build metadata.
//!
//! Each function returns one layer of the composed environment. Layers
//! are merged with [`combine`], later layers taking precedence.

use crate::{Build, Repo, Stage, System};
use std::collections::BTreeMap;

/// Merge environment maps in order of increasing precedence.
pub fn combine(maps: &[BTreeMap<String, String>]) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for map in maps {
        for (k, v) in map {
            out.insert(k.clone(), v.clone());
        }
    }
    out
}

/// Variables describing the control-plane server.
pub fn system(system: &System) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("CI".to_string(), "true".to_string());
    env.insert("DRONE".to_string(), "true".to_string());
    env.insert("DRONE_SYSTEM_PROTO".to_string(), system.proto.clone());
    env.insert("DRONE_SYSTEM_HOST".to_string(), system.host.clone());
    env.insert(
        "DRONE_SYSTEM_HOSTNAME".to_string(),
        system.host.clone(),
    );
    env.insert("DRONE_SYSTEM_VERSION".to_string(), system.version.clone());
    env
}

/// Variables describing the repository.
pub fn repo(repo: &Repo) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("DRONE_REPO".to_string(), repo.slug.clone());
    env.insert("DRONE_REPO_OWNER".to_string(), repo.namespace.clone());
    env.insert("DRONE_REPO_NAMESPACE".to_string(), repo.namespace.clone());
    env.insert("DRONE_REPO_NAME".to_string(), repo.name.clone());
    env.insert("DRONE_REPO_LINK".to_string(), repo.link.clone());
    env.insert("DRONE_REPO_BRANCH".to_string(), repo.branch.clone());
    env.insert("DRONE_REMOTE_URL".to_string(), repo.http_url.clone());
    env.insert("DRONE_GIT_HTTP_URL".to_string(), repo.http_url.clone());
    env.insert("DRONE_GIT_SSH_URL".to_string(), repo.ssh_url.clone());
    env.insert(
        "DRONE_REPO_PRIVATE".to_string(),
        repo.private.to_string(),
    );
    env
}

/// Variables describing the build.
pub fn build(build: &Build) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("DRONE_BUILD_NUMBER".to_string(), build.number.to_string());
    env.insert("DRONE_BUILD_PARENT".to_string(), build.parent.to_string());
    env.insert("DRONE_BUILD_STATUS".to_string(), build.status.to_string());
    env.insert("DRONE_BUILD_EVENT".to_string(), build.event.clone());
    env.insert("DRONE_BUILD_ACTION".to_string(), build.action.clone());
    env.insert("DRONE_COMMIT".to_string(), build.after.clone());
    env.insert("DRONE_COMMIT_SHA".to_string(), build.after.clone());
    env.insert("DRONE_COMMIT_BEFORE".to_string(), build.before.clone());
    env.insert("DRONE_COMMIT_AFTER".to_string(), build.after.clone());
    env.insert("DRONE_COMMIT_REF".to_string(), build.git_ref.clone());
    env.insert("DRONE_COMMIT_BRANCH".to_string(), build.target.clone());
    env.insert("DRONE_COMMIT_MESSAGE".to_string(), build.message.clone());
    env.insert(
        "DRONE_COMMIT_AUTHOR".to_string(),
        build.author_login.clone(),
    );
    env.insert(
        "DRONE_COMMIT_AUTHOR_NAME".to_string(),
        build.author_name.clone(),
    );
    env.insert(
        "DRONE_COMMIT_AUTHOR_EMAIL".to_string(),
        build.author_email.clone(),
    );
    env.insert("DRONE_SOURCE_BRANCH".to_string(), build.source.clone());
    env.insert("DRONE_TARGET_BRANCH".to_string(), build.target.clone());
    env.insert("DRONE_DEPLOY_TO".to_string(), build.deploy_to.clone());
    if build.event == crate::build::event::TAG {
        env.insert(
            "DRONE_TAG".to_string(),
            build
                .git_ref
                .strip_prefix("refs/tags/")
                .unwrap_or(&build.git_ref)
                .to_string(),
        );
    }
    if build.event == crate::build::event::PULL_REQUEST {
        env.insert(
            "DRONE_PULL_REQUEST".to_string(),
            build
                .git_ref
                .trim_start_matches("refs/pull/")
                .trim_end_matches("/merge")
                .trim_end_matches("/head")
                .to_string(),
        );
    }
    env
}

/// Variables describing the stage.
pub fn stage(stage: &Stage) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("DRONE_STAGE_NAME".to_string(), stage.name.clone());
    env.insert("DRONE_STAGE_NUMBER".to_string(), stage.number.to_string());
    env.insert("DRONE_STAGE_MACHINE".to_string(), stage.machine.clone());
    env.insert("DRONE_STAGE_OS".to_string(), stage.os.clone());
    env.insert("DRONE_STAGE_ARCH".to_string(), stage.arch.clone());
    env.insert("DRONE_STAGE_STARTED".to_string(), stage.started.to_string());
    env
}

/// Deep links into the user interface.
pub fn link(repo: &Repo, build: &Build, system: &System) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert(
        "DRONE_BUILD_LINK".to_string(),
        format!(
            "{}://{}/{}/{}",
            system.proto, system.host, repo.slug, build.number
        ),
    );
    env
}

#[cfg(test)]
#[path = "environ_tests.rs"]
mod tests;
