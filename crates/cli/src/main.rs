// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! gantry - CI stage runner for Kubernetes
//!
//! Claims build stages from the control plane and executes each one as
//! a single pod, one container per step.

use clap::{Parser, Subcommand};

mod commands;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "gantry")]
#[command(about = "Gantry - CI stage runner for Kubernetes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    config: Config,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the control plane and execute stages
    Daemon,
    /// Execute a single stage that was already assigned to this runner
    Exec {
        /// Stage identifier
        stage_id: i64,
    },
    /// Compile a pipeline file locally and print the plan
    Compile {
        /// Path to the pipeline YAML
        path: std::path::PathBuf,
        /// Pipeline name to compile
        #[arg(long, default_value = "")]
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon => commands::daemon::handle(cli.config).await,
        Commands::Exec { stage_id } => commands::exec::handle(cli.config, stage_id).await,
        Commands::Compile { path, name } => commands::compile::handle(path, name).await,
    }
}
