// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Clone, Default)]
struct CollectSink {
    lines: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl LineSink for CollectSink {
    async fn write_line(&self, text: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());
    }
}

impl CollectSink {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

fn stream_of(chunks: &[&[u8]]) -> LogStream {
    let (tx, rx) = mpsc::unbounded_channel();
    for chunk in chunks {
        tx.send(Ok(bytes::Bytes::copy_from_slice(chunk))).unwrap();
    }
    LogStream::new(rx)
}

#[tokio::test]
async fn splits_chunks_into_lines() {
    let sink = CollectSink::default();
    copy(stream_of(&[b"one\ntwo\n", b"three\n"]), &sink)
        .await
        .unwrap();
    assert_eq!(sink.lines(), vec!["one", "two", "three"]);
}

#[tokio::test]
async fn joins_lines_split_across_chunks() {
    let sink = CollectSink::default();
    copy(stream_of(&[b"hel", b"lo\nwor", b"ld\n"]), &sink)
        .await
        .unwrap();
    assert_eq!(sink.lines(), vec!["hello", "world"]);
}

#[tokio::test]
async fn flushes_trailing_partial_line_on_close() {
    let sink = CollectSink::default();
    copy(stream_of(&[b"no newline at end"]), &sink)
        .await
        .unwrap();
    assert_eq!(sink.lines(), vec!["no newline at end"]);
}

#[tokio::test]
async fn upstream_close_is_not_an_error() {
    let sink = CollectSink::default();
    let (tx, rx) = mpsc::unbounded_channel::<Result<bytes::Bytes, _>>();
    drop(tx);
    assert!(copy(LogStream::new(rx), &sink).await.is_ok());
    assert!(sink.lines().is_empty());
}

#[tokio::test]
async fn stalled_partial_line_flushes_on_interval() {
    let sink = CollectSink::default();
    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(Ok(bytes::Bytes::from_static(b"progress 42%"))).unwrap();

    let copy_sink = sink.clone();
    let handle = tokio::spawn(async move { copy(LogStream::new(rx), &copy_sink).await });

    // The partial line should surface after roughly one interval.
    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    assert_eq!(sink.lines(), vec!["progress 42%"]);

    drop(tx);
    handle.await.unwrap().unwrap();
}
