// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod compile;
pub mod daemon;
pub mod exec;

use crate::config::Config;
use anyhow::Context;
use gantry_client::registry;
use gantry_client::HttpClient;
use gantry_core::SystemClock;
use gantry_engine::compiler::Compiler;
use gantry_engine::PodEngine;
use gantry_orchestrator::{KubeConfig, KubeOrchestrator};
use gantry_runner::Runner;
use std::sync::Arc;

pub type KubeRunner = Runner<HttpClient, PodEngine<KubeOrchestrator>, SystemClock>;

/// Wire the runner from configuration.
pub fn build_runner(config: &Config) -> anyhow::Result<KubeRunner> {
    let client = HttpClient::new(&config.rpc_host, &config.rpc_secret, config.rpc_skip_verify)
        .context("cannot create control-plane client")?;

    let orchestrator = if config.kubernetes_url.is_empty() {
        KubeOrchestrator::in_cluster().context("cannot load in-cluster configuration")?
    } else {
        KubeOrchestrator::new(KubeConfig {
            url: config.kubernetes_url.clone(),
            token: config.kubernetes_token.clone(),
            ca_bundle: None,
        })
        .context("cannot create kubernetes client")?
    };

    let registries: Arc<dyn registry::Provider> = Arc::new(
        registry::External::new(&config.registry_endpoint, &config.registry_secret, false)
            .context("cannot create registry provider")?,
    );

    Ok(Runner {
        client,
        engine: Arc::new(PodEngine::new(orchestrator)),
        compiler: Compiler {
            namespace: config.namespace.clone(),
            service_account: config.service_account.clone(),
            ..Compiler::default()
        },
        machine: config.machine(),
        environ: Default::default(),
        registries,
        match_func: None,
        clock: SystemClock,
    })
}
