//! Per-thread subscription lifecycle.
//!
//! A view shows exactly one thread at a time. Switching threads must not
//! race: the old delivery task is fully torn down before the new one is
//! treated as ready, so one thread's events can never bleed into
//! another's view.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use mingle_types::api::MessageView;

use crate::poller::{MessageSource, ThreadPoller};

#[derive(Default)]
pub struct ThreadWatcher {
    active: Option<ActiveThread>,
}

struct ActiveThread {
    thread_id: String,
    task: JoinHandle<()>,
}

impl ThreadWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_thread(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.thread_id.as_str())
    }

    /// Start watching a thread, tearing down the previous subscription
    /// first. Returns once the new poll task is running.
    pub async fn open<S>(
        &mut self,
        source: S,
        thread_id: &str,
        out: mpsc::UnboundedSender<MessageView>,
    ) where
        S: MessageSource + Send + 'static,
    {
        self.close().await;

        let poller = ThreadPoller::new(source, thread_id);
        let task = tokio::spawn(poller.run(out));
        self.active = Some(ActiveThread {
            thread_id: thread_id.to_string(),
            task,
        });
    }

    /// Stop the active subscription and wait for its task to finish.
    pub async fn close(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
            // Await the abort so the old channel is provably torn down
            // before a new one is opened.
            let _ = active.task.await;
        }
    }
}

impl Drop for ThreadWatcher {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    /// Source that reports which thread was fetched.
    #[derive(Clone)]
    struct CountingSource {
        fetches: Arc<AtomicUsize>,
        serve_for: String,
    }

    impl MessageSource for CountingSource {
        async fn fetch_since(
            &self,
            thread_id: &str,
            _since: Option<chrono::DateTime<chrono::Utc>>,
        ) -> anyhow::Result<Vec<mingle_types::api::MessageView>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if thread_id == self.serve_for {
                Ok(vec![mingle_types::api::MessageView {
                    id: format!("{}-{}", thread_id, self.fetches.load(Ordering::SeqCst)),
                    content: "hi".into(),
                    sender_id: "usr_2".into(),
                    sender_name: None,
                    sender_avatar: None,
                    created_at: DateTime::from_timestamp_millis(
                        self.fetches.load(Ordering::SeqCst) as i64 * 1000,
                    )
                    .unwrap(),
                    is_own: false,
                }])
            } else {
                Ok(Vec::new())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn switching_threads_stops_the_old_subscription() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            fetches: fetches.clone(),
            serve_for: "evt_1--usr_2".into(),
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = ThreadWatcher::new();

        watcher.open(source.clone(), "evt_1--usr_2", tx.clone()).await;
        assert_eq!(watcher.current_thread(), Some("evt_1--usr_2"));
        let first = rx.recv().await.unwrap();
        assert!(first.id.starts_with("evt_1--usr_2"));

        // Switch; the old task is awaited-down before the new one runs.
        watcher.open(source.clone(), "evt_9--usr_3", tx.clone()).await;
        assert_eq!(watcher.current_thread(), Some("evt_9--usr_3"));

        let before = fetches.load(Ordering::SeqCst);
        tokio::time::advance(crate::poller::POLL_INTERVAL * 3).await;
        // `advance` wakes the spawned poll task's timer but does not drive
        // it; yield so the task actually runs its fetch before we observe.
        tokio::task::yield_now().await;
        // New thread polls but serves nothing; the old thread's messages
        // never arrive again.
        assert!(fetches.load(Ordering::SeqCst) > before);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn close_is_idempotent() {
        let mut watcher = ThreadWatcher::new();
        watcher.close().await;
        assert_eq!(watcher.current_thread(), None);
    }
}
