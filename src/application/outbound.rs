//! Fire-and-forget side effects.
//!
//! Mutating operations finish by submitting tasks here instead of awaiting
//! them: producers enqueue and return immediately, a single consumer drains
//! the queue and logs failures. Nothing on this path can fail the primary
//! mutation that triggered it.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::application::analytics::invalidate_pattern;
use crate::domain::ports::{CacheStore, Notifier};

#[derive(Debug, Clone)]
pub enum OutboundTask {
    Notify {
        recipient: String,
        subject: String,
        body: String,
    },
    InvalidateCache {
        pattern: String,
    },
}

/// Cloneable producer handle. Submitting never blocks and never fails the
/// caller; a closed queue is logged and the task dropped.
#[derive(Clone)]
pub struct OutboundQueue {
    tx: UnboundedSender<OutboundTask>,
}

impl OutboundQueue {
    pub fn notify(&self, recipient: String, subject: String, body: String) {
        self.submit(OutboundTask::Notify {
            recipient,
            subject,
            body,
        });
    }

    pub fn invalidate_cache(&self, pattern: &str) {
        self.submit(OutboundTask::InvalidateCache {
            pattern: pattern.to_string(),
        });
    }

    fn submit(&self, task: OutboundTask) {
        if self.tx.send(task).is_err() {
            log::warn!("outbound queue is closed; dropping task");
        }
    }
}

pub fn channel() -> (OutboundQueue, UnboundedReceiver<OutboundTask>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (OutboundQueue { tx }, rx)
}

/// Consume tasks until every producer handle is dropped. Each task runs on
/// the blocking pool; failures are logged, never retried or surfaced.
pub async fn run_worker<N, S>(
    mut rx: UnboundedReceiver<OutboundTask>,
    notifier: Arc<N>,
    cache: Option<S>,
) where
    N: Notifier,
    S: CacheStore + Clone,
{
    while let Some(task) = rx.recv().await {
        let notifier = Arc::clone(&notifier);
        let cache = cache.clone();
        let handled = tokio::task::spawn_blocking(move || handle(task, &*notifier, cache.as_ref()));
        if let Err(e) = handled.await {
            log::error!("outbound task panicked: {e}");
        }
    }
}

fn handle<N: Notifier, S: CacheStore>(task: OutboundTask, notifier: &N, cache: Option<&S>) {
    match task {
        OutboundTask::Notify {
            recipient,
            subject,
            body,
        } => {
            if let Err(e) = notifier.send(&recipient, &subject, &body) {
                log::warn!("notification to {recipient} failed: {e}");
            }
        }
        OutboundTask::InvalidateCache { pattern } => match cache {
            Some(store) => match invalidate_pattern(store, &pattern) {
                Ok(n) => log::debug!("invalidated {n} cache entries matching {pattern}"),
                Err(e) => log::warn!("cache invalidation for {pattern} failed: {e}"),
            },
            None => log::debug!("no cache store configured; skipping invalidation"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{FailingNotifier, InMemoryCacheStore, RecordingNotifier};

    #[tokio::test]
    async fn worker_delivers_notifications() {
        let (queue, rx) = channel();
        let notifier = Arc::new(RecordingNotifier::default());
        let worker = tokio::spawn(run_worker::<_, InMemoryCacheStore>(
            rx,
            Arc::clone(&notifier),
            None,
        ));

        queue.notify("a@example.com".into(), "subject".into(), "body".into());
        drop(queue);
        worker.await.unwrap();

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "a@example.com");
    }

    #[tokio::test]
    async fn worker_swallows_notifier_failures() {
        let (queue, rx) = channel();
        let worker = tokio::spawn(run_worker::<_, InMemoryCacheStore>(
            rx,
            Arc::new(FailingNotifier),
            None,
        ));

        queue.notify("a@example.com".into(), "subject".into(), "body".into());
        drop(queue);
        // A failed send must not bring the worker down.
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn worker_invalidates_matching_cache_keys() {
        let store = InMemoryCacheStore::default();
        store.set("analytics:orders:summary", "{}", 60).unwrap();
        store.set("session:abc", "{}", 60).unwrap();

        let (queue, rx) = channel();
        let worker = tokio::spawn(run_worker(
            rx,
            Arc::new(RecordingNotifier::default()),
            Some(store.clone()),
        ));

        queue.invalidate_cache("analytics:orders:*");
        drop(queue);
        worker.await.unwrap();

        assert_eq!(store.get("analytics:orders:summary").unwrap(), None);
        assert!(store.get("session:abc").unwrap().is_some());
    }
}
