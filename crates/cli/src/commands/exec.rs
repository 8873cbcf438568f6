// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot execution of an assigned stage.

use crate::config::Config;

pub async fn handle(config: Config, stage_id: i64) -> anyhow::Result<()> {
    let runner = super::build_runner(&config)?;
    runner.run_accepted(stage_id).await?;
    Ok(())
}
