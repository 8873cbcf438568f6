// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Poll-and-execute daemon mode.

use crate::config::Config;
use gantry_runner::Poller;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn handle(config: Config) -> anyhow::Result<()> {
    let runner = Arc::new(super::build_runner(&config)?);
    let cancel = CancellationToken::new();

    info!(
        machine = %config.machine(),
        capacity = config.capacity,
        "starting gantry daemon"
    );

    let mut workers = Vec::new();
    for _ in 0..config.capacity.max(1) {
        let poller = Poller {
            runner: Arc::clone(&runner),
            os: "linux".to_string(),
            arch: std::env::consts::ARCH.to_string(),
        };
        let cancel = cancel.clone();
        workers.push(tokio::spawn(async move { poller.poll(cancel).await }));
    }

    // Run until asked to stop.
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    cancel.cancel();
    for worker in workers {
        let _ = worker.await;
    }
    Ok(())
}
