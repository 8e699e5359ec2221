//! Non-blocking settled-future set.
//!
//! The async check gate parks its background checks here; the engine drains
//! settled results at the top of each step without ever blocking on pending
//! work. Rejections (panics) and `None` resolutions contribute nothing.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// A set of in-flight futures whose non-null resolutions accumulate until
/// drained.
#[derive(Debug)]
pub struct InterruptQueue<T> {
    inner: Arc<Inner<T>>,
}

#[derive(Debug)]
struct Inner<T> {
    settled: Mutex<Vec<T>>,
    pending: AtomicUsize,
    notify: Notify,
}

impl<T> Clone for InterruptQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> InterruptQueue<T> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                settled: Mutex::new(Vec::new()),
                pending: AtomicUsize::new(0),
                notify: Notify::new(),
            }),
        }
    }

    /// Enqueue a future. A `None` resolution (or a panic) produces no
    /// interrupt.
    pub fn enqueue<F>(&self, future: F)
    where
        F: Future<Output = Option<T>> + Send + 'static,
    {
        let inner = self.inner.clone();
        let _ = inner.pending.fetch_add(1, Ordering::SeqCst);
        let _ = tokio::spawn(async move {
            // The inner spawn converts a panic into a join error → None.
            let result = tokio::spawn(future).await.ok().flatten();
            if let Some(value) = result {
                inner.settled.lock().push(value);
            }
            let _ = inner.pending.fetch_sub(1, Ordering::SeqCst);
            inner.notify.notify_waiters();
        });
    }

    /// Remove and return all settled non-null values. Idempotent: a second
    /// drain with nothing new returns empty.
    #[must_use]
    pub fn drain(&self) -> Vec<T> {
        std::mem::take(&mut *self.inner.settled.lock())
    }

    /// Await all pending futures, then drain.
    pub async fn flush(&self) -> Vec<T> {
        loop {
            let notified = self.inner.notify.notified();
            if self.inner.pending.load(Ordering::SeqCst) == 0 {
                break;
            }
            notified.await;
        }
        self.drain()
    }

    /// Number of unsettled futures.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }
}

impl<T: Send + 'static> Default for InterruptQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn flush_returns_non_null_resolutions() {
        let queue: InterruptQueue<String> = InterruptQueue::new();
        queue.enqueue(async { Some("a".to_owned()) });
        queue.enqueue(async { None });
        queue.enqueue(async { Some("b".to_owned()) });

        let mut values = queue.flush().await;
        values.sort();
        assert_eq!(values, vec!["a".to_owned(), "b".to_owned()]);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn drain_is_idempotent() {
        let queue: InterruptQueue<u32> = InterruptQueue::new();
        queue.enqueue(async { Some(1) });
        let _ = queue.flush().await;
        assert!(queue.drain().is_empty());
        assert!(queue.drain().is_empty());
    }

    #[tokio::test]
    async fn drain_does_not_block_on_pending() {
        let queue: InterruptQueue<u32> = InterruptQueue::new();
        queue.enqueue(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Some(1)
        });
        queue.enqueue(async { Some(2) });

        // Give the quick future a moment to settle
        tokio::time::sleep(Duration::from_millis(50)).await;
        let values = queue.drain();
        assert_eq!(values, vec![2]);
        assert_eq!(queue.pending(), 1);
    }

    #[tokio::test]
    async fn panicking_future_contributes_nothing() {
        let queue: InterruptQueue<u32> = InterruptQueue::new();
        queue.enqueue(async { panic!("check blew up") });
        queue.enqueue(async { Some(7) });

        let values = queue.flush().await;
        assert_eq!(values, vec![7]);
    }

    #[tokio::test]
    async fn flush_on_empty_queue() {
        let queue: InterruptQueue<u32> = InterruptQueue::new();
        assert!(queue.flush().await.is_empty());
    }

    #[tokio::test]
    async fn pending_counts_unsettled() {
        let queue: InterruptQueue<u32> = InterruptQueue::new();
        queue.enqueue(async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Some(1)
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(queue.pending(), 1);
        let _ = queue.flush().await;
        assert_eq!(queue.pending(), 0);
    }
}
