// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner configuration, sourced from flags or the environment.

use clap::Args;

#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Control-plane address, e.g. https://drone.company.com
    #[arg(long, env = "GANTRY_RPC_HOST", default_value = "")]
    pub rpc_host: String,

    /// Shared runner secret
    #[arg(long, env = "GANTRY_RPC_SECRET", default_value = "", hide_env_values = true)]
    pub rpc_secret: String,

    /// Skip TLS verification towards the control plane
    #[arg(long, env = "GANTRY_RPC_SKIP_VERIFY")]
    pub rpc_skip_verify: bool,

    /// Name reported as the stage machine
    #[arg(long, env = "GANTRY_RUNNER_NAME", default_value = "")]
    pub name: String,

    /// Number of stages executed concurrently
    #[arg(long, env = "GANTRY_RUNNER_CAPACITY", default_value_t = 2)]
    pub capacity: usize,

    /// Fixed namespace for stage pods; empty runs each stage in its
    /// own namespace
    #[arg(long, env = "GANTRY_NAMESPACE_DEFAULT", default_value = "")]
    pub namespace: String,

    /// Service account for stage pods
    #[arg(long, env = "GANTRY_SERVICE_ACCOUNT_DEFAULT", default_value = "")]
    pub service_account: String,

    /// Kubernetes API server; empty uses the in-cluster configuration
    #[arg(long, env = "GANTRY_KUBERNETES_URL", default_value = "")]
    pub kubernetes_url: String,

    /// Bearer token for the Kubernetes API
    #[arg(long, env = "GANTRY_KUBERNETES_TOKEN", default_value = "", hide_env_values = true)]
    pub kubernetes_token: String,

    /// Registry credential plugin endpoint
    #[arg(long, env = "GANTRY_REGISTRY_ENDPOINT", default_value = "")]
    pub registry_endpoint: String,

    /// Registry credential plugin secret
    #[arg(long, env = "GANTRY_REGISTRY_SECRET", default_value = "", hide_env_values = true)]
    pub registry_secret: String,
}

impl Config {
    /// The machine name reported upstream.
    pub fn machine(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        std::env::var("HOSTNAME").unwrap_or_else(|_| "gantry".to_string())
    }
}
