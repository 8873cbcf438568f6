// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-oriented copy of a container log stream.
//!
//! Output is flushed to the sink on every newline. A partial line that
//! sits in the buffer longer than the flush interval is emitted as-is
//! so slow writers still surface promptly.

use async_trait::async_trait;
use gantry_orchestrator::LogStream;
use std::time::Duration;
use tokio::time::interval;

/// Flush cadence for partial lines.
const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Receives step output one line at a time.
#[async_trait]
pub trait LineSink: Send + Sync {
    async fn write_line(&self, text: &str);
}

/// Sink that discards output.
pub struct NullSink;

#[async_trait]
impl LineSink for NullSink {
    async fn write_line(&self, _text: &str) {}
}

/// Copy the stream into the sink until the upstream closes.
///
/// An upstream close before step termination is not an error here;
/// the engine's terminated watch is the source of truth for step
/// completion. Transport errors end the copy and surface to the
/// caller.
pub async fn copy(
    mut stream: LogStream,
    sink: &dyn LineSink,
) -> Result<(), gantry_orchestrator::OrchestratorError> {
    let mut pending = Vec::new();
    let mut ticker = interval(FLUSH_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick is immediate; consume it.
    ticker.tick().await;

    loop {
        tokio::select! {
            chunk = stream.next_chunk() => {
                match chunk {
                    Some(Ok(bytes)) => {
                        for byte in bytes {
                            if byte == b'\n' {
                                let line = String::from_utf8_lossy(&pending).into_owned();
                                sink.write_line(&line).await;
                                pending.clear();
                            } else {
                                pending.push(byte);
                            }
                        }
                    }
                    Some(Err(err)) => {
                        flush(&mut pending, sink).await;
                        return Err(err);
                    }
                    None => {
                        flush(&mut pending, sink).await;
                        return Ok(());
                    }
                }
            }
            _ = ticker.tick() => {
                flush(&mut pending, sink).await;
            }
        }
    }
}

async fn flush(pending: &mut Vec<u8>, sink: &dyn LineSink) {
    if pending.is_empty() {
        return;
    }
    let line = String::from_utf8_lossy(pending).into_owned();
    sink.write_line(&line).await;
    pending.clear();
}

#[cfg(test)]
#[path = "livelog_tests.rs"]
mod tests;
