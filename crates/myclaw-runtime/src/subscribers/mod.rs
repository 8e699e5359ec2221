//! Event-bus subscribers: session log, metrics, async check gate, and
//! user-profile learning.
//!
//! Each subscriber owns a drain task over its own bus receiver, so a slow or
//! faulty subscriber can only lose its own events. Shared plumbing lives
//! here: the drain-task wrapper and the per-session serialized JSONL writer.

pub mod checks;
pub mod metrics;
pub mod profile;
pub mod session_log;

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::warn;

use myclaw_core::events::AgentEvent;

use crate::bus::EventBus;

/// RFC 3339 timestamp for persisted records.
#[must_use]
pub(crate) fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ─────────────────────────────────────────────────────────────────────────────
// Drain task
// ─────────────────────────────────────────────────────────────────────────────

/// A subscriber's owned drain task with catch-up tracking.
pub struct SubscriberTask {
    bus: EventBus,
    /// Events published before this task subscribed (never delivered to it).
    baseline: u64,
    processed: Arc<AtomicU64>,
    handle: tokio::task::JoinHandle<()>,
}

impl SubscriberTask {
    /// Subscribe to the bus and spawn a task feeding `handler`.
    pub fn spawn<F, Fut>(bus: &EventBus, mut handler: F) -> Self
    where
        F: FnMut(AgentEvent) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut rx = bus.subscribe();
        let baseline = bus.published_count();
        let processed = Arc::new(AtomicU64::new(0));
        let counter = processed.clone();

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        handler(event).await;
                        let _ = counter.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(dropped = n, "subscriber lagged, events lost");
                        let _ = counter.fetch_add(n, Ordering::SeqCst);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self {
            bus: bus.clone(),
            baseline,
            processed,
            handle,
        }
    }

    /// Wait until every event published since subscription has been handled.
    pub async fn caught_up(&self) {
        let target = self.bus.published_count().saturating_sub(self.baseline);
        while self.processed.load(Ordering::SeqCst) < target {
            tokio::task::yield_now().await;
        }
    }

    /// Stop the drain task.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-session serialized JSONL writer
// ─────────────────────────────────────────────────────────────────────────────

enum WriteRequest {
    Line(String),
    Flush(oneshot::Sender<()>),
}

/// Per-session append-only JSONL writers.
///
/// Each session gets one worker; all lines for a session pass through its
/// queue, so lines never interleave. Writes are best-effort: an I/O failure
/// is logged and swallowed.
#[derive(Default)]
pub(crate) struct JsonlWriters {
    workers: Mutex<HashMap<String, mpsc::UnboundedSender<WriteRequest>>>,
}

impl JsonlWriters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or keep) the worker for a session.
    pub fn register(&self, session_id: &str, path: PathBuf) {
        let mut workers = self.workers.lock();
        if workers.contains_key(session_id) {
            return;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tokio::spawn(write_worker(path, rx));
        let _ = workers.insert(session_id.to_owned(), tx);
    }

    /// Queue one record for a session. Unregistered sessions are ignored.
    pub fn write(&self, session_id: &str, record: &serde_json::Value) {
        let workers = self.workers.lock();
        let Some(tx) = workers.get(session_id) else {
            return;
        };
        if let Ok(line) = serde_json::to_string(record) {
            let _ = tx.send(WriteRequest::Line(line));
        }
    }

    /// Await the session's queue, then drop its worker.
    pub async fn finish(&self, session_id: &str) {
        let sender = self.workers.lock().remove(session_id);
        if let Some(tx) = sender {
            let (ack_tx, ack_rx) = oneshot::channel();
            if tx.send(WriteRequest::Flush(ack_tx)).is_ok() {
                let _ = ack_rx.await;
            }
        }
    }

    /// Await all pending writes across sessions.
    pub async fn flush_all(&self) {
        let senders: Vec<mpsc::UnboundedSender<WriteRequest>> =
            self.workers.lock().values().cloned().collect();
        for tx in senders {
            let (ack_tx, ack_rx) = oneshot::channel();
            if tx.send(WriteRequest::Flush(ack_tx)).is_ok() {
                let _ = ack_rx.await;
            }
        }
    }
}

async fn write_worker(path: PathBuf, mut rx: mpsc::UnboundedReceiver<WriteRequest>) {
    while let Some(request) = rx.recv().await {
        match request {
            WriteRequest::Line(line) => {
                if let Err(e) = append_line(&path, &line).await {
                    warn!(path = %path.display(), error = %e, "jsonl append failed");
                }
            }
            WriteRequest::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

async fn append_line(path: &PathBuf, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn writer_appends_lines_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let writers = JsonlWriters::new();
        writers.register("s1", path.clone());

        for i in 0..20 {
            writers.write("s1", &json!({"seq": i}));
        }
        writers.flush_all().await;

        let content = std::fs::read_to_string(&path).unwrap();
        let seqs: Vec<u64> = content
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["seq"]
                .as_u64()
                .unwrap())
            .collect();
        assert_eq!(seqs, (0..20).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn unregistered_session_is_ignored() {
        let writers = JsonlWriters::new();
        writers.write("ghost", &json!({"x": 1}));
        writers.flush_all().await;
    }

    #[tokio::test]
    async fn finish_drains_then_drops_worker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let writers = JsonlWriters::new();
        writers.register("s1", path.clone());
        writers.write("s1", &json!({"final": true}));
        writers.finish("s1").await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("final"));
        // Worker gone: further writes are ignored
        writers.write("s1", &json!({"late": true}));
        writers.flush_all().await;
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("late"));
    }

    #[tokio::test]
    async fn subscriber_task_catches_up() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicU64::new(0));
        let seen_clone = seen.clone();
        let task = SubscriberTask::spawn(&bus, move |_event| {
            let seen = seen_clone.clone();
            async move {
                let _ = seen.fetch_add(1, Ordering::SeqCst);
            }
        });

        for _ in 0..5 {
            let _ = bus.publish(AgentEvent::SessionEnd {
                session_id: "s".into(),
            });
        }
        task.caught_up().await;
        assert_eq!(seen.load(Ordering::SeqCst), 5);
        task.abort();
    }
}
