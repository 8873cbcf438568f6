// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build, repository and system descriptors fetched with a stage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Event kinds that can trigger a build.
pub mod event {
    pub const PUSH: &str = "push";
    pub const PULL_REQUEST: &str = "pull_request";
    pub const TAG: &str = "tag";
    pub const PROMOTE: &str = "promote";
    pub const CRON: &str = "cron";
}

/// A single build of a repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Build {
    pub id: i64,
    pub repo_id: i64,
    pub number: i64,
    #[serde(default)]
    pub parent: i64,
    pub status: crate::Status,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub before: String,
    #[serde(default)]
    pub after: String,
    #[serde(rename = "ref", default)]
    pub git_ref: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub author_login: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub author_email: String,
    #[serde(default)]
    pub sender: String,
    /// User-supplied parameters (promote/restart), exported to the env.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub deploy_to: String,
    #[serde(default)]
    pub started: i64,
    #[serde(default)]
    pub finished: i64,
}

/// A source repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Repo {
    pub id: i64,
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub http_url: String,
    #[serde(default)]
    pub ssh_url: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub trusted: bool,
    /// Wall-clock budget for a stage, in minutes.
    #[serde(default)]
    pub timeout: i64,
}

/// The control-plane server description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct System {
    #[serde(default)]
    pub proto: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub version: String,
}

/// Credentials for cloning over HTTP.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Netrc {
    #[serde(default)]
    pub machine: String,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
}

/// A named secret, optionally restricted from pull-request builds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    pub data: String,
    #[serde(default)]
    pub pull_request: bool,
}

/// Image registry credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    pub address: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}
