// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-step log streaming to the control plane.
//!
//! Lines are numbered and stamped with seconds since step start,
//! buffered, and flushed upstream on an interval. Closing uploads the
//! complete log.

use gantry_client::{Client, Line};
use gantry_core::Clock;
use gantry_engine::livelog::LineSink;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Batch flush cadence.
const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Default)]
struct LogBuffer {
    pending: Vec<Line>,
    history: Vec<Line>,
    count: i64,
    closed: bool,
}

/// Streams one step's output to the server.
pub struct RemoteLog<C: Client, K: Clock> {
    client: C,
    clock: K,
    step_id: i64,
    started: Instant,
    buffer: Mutex<LogBuffer>,
}

impl<C: Client, K: Clock> RemoteLog<C, K> {
    pub fn new(client: C, clock: K, step_id: i64) -> Arc<Self> {
        let started = clock.now();
        Arc::new(Self {
            client,
            clock,
            step_id,
            started,
            buffer: Mutex::new(LogBuffer::default()),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogBuffer> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start the background flusher. It stops when the log is closed
    /// or the stage is cancelled.
    pub fn spawn_flusher(self: &Arc<Self>, cancel: CancellationToken) {
        let log = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(FLUSH_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = cancel.cancelled() => break,
                }
                if log.lock().closed {
                    break;
                }
                log.flush().await;
            }
        });
    }

    async fn flush(&self) {
        let batch = {
            let mut buffer = self.lock();
            std::mem::take(&mut buffer.pending)
        };
        if batch.is_empty() {
            return;
        }
        if let Err(err) = self.client.batch(self.step_id, &batch).await {
            tracing::warn!(step = self.step_id, error = %err, "cannot upload log batch");
        }
    }

    /// Final flush plus full-log upload.
    pub async fn close(&self) {
        self.flush().await;
        let history = {
            let mut buffer = self.lock();
            buffer.closed = true;
            buffer.history.clone()
        };
        if let Err(err) = self.client.upload(self.step_id, &history).await {
            tracing::warn!(step = self.step_id, error = %err, "cannot upload logs");
        }
    }
}

#[async_trait]
impl<C: Client, K: Clock> LineSink for RemoteLog<C, K> {
    async fn write_line(&self, text: &str) {
        let elapsed = self
            .clock
            .now()
            .saturating_duration_since(self.started)
            .as_secs() as i64;
        let mut buffer = self.lock();
        if buffer.closed {
            return;
        }
        let line = Line {
            number: buffer.count,
            message: format!("{text}\n"),
            timestamp: elapsed,
        };
        buffer.count += 1;
        buffer.pending.push(line.clone());
        buffer.history.push(line);
    }
}

#[cfg(test)]
#[path = "streamer_tests.rs"]
mod tests;
